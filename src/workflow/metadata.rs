use anyhow::{Context, Result};
use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

/// Workflow metadata shown to people launching it: labels, descriptions and parameter rules
#[derive(Serialize)]
pub struct WorkflowMetadata {
    display_name: &'static str,
    description: &'static str,
    documentation: &'static str,
    author: Author,
    repository: &'static str,
    parameters: Vec<Parameter>,
}

#[derive(Serialize)]
struct Author {
    name: &'static str,
    email: &'static str,
    github: &'static str,
}

#[derive(Serialize)]
struct Parameter {
    name: &'static str,
    flag: &'static str,
    display_name: &'static str,
    description: &'static str,
    batch_table_column: bool,
    rule: Option<Rule>,
}

#[derive(Serialize)]
struct Rule {
    regex: &'static str,
    message: &'static str,
}

pub fn workflow_metadata() -> WorkflowMetadata {
    WorkflowMetadata {
        display_name: "downsample reads",
        description: "Quick workflow for downsampling paired-end reads with bbmap reformat. \
            Assumes fasta/q format; set either out reads or sample rate.",
        documentation: "https://github.com/BioInfoTools/BBMap/blob/master/sh/reformat.sh",
        author: Author {
            name: "James McGann",
            email: "jpaulmcgann@gmail.com",
            github: "github.com/jpmcga",
        },
        repository: "https://github.com/jpmcga/spatial-atacseq_latch/",
        parameters: vec![
            Parameter {
                name: "r1",
                flag: "r1",
                display_name: "read 1",
                description: "either fasta or fastq",
                batch_table_column: true,
                rule: None,
            },
            Parameter {
                name: "r2",
                flag: "r2",
                display_name: "read 2",
                description: "either fasta or fastq",
                batch_table_column: true,
                rule: None,
            },
            Parameter {
                name: "out_dir",
                flag: "out-dir",
                display_name: "out dir",
                description: "name of subdir in downsampled/",
                batch_table_column: true,
                rule: Some(Rule { regex: "^[^/].*", message: "out dir cannot start with a '/'" }),
            },
            Parameter {
                name: "out_reads",
                flag: "out-reads",
                display_name: "out reads",
                description: "exact number of OUTPUT reads (or pairs) desired",
                batch_table_column: true,
                rule: Some(Rule { regex: "^[1-9][0-9]*$", message: "out reads must be a positive integer" }),
            },
            Parameter {
                name: "sample_rate",
                flag: "sample-rate",
                display_name: "sample rate",
                description: "fraction of input reads to retain, above 0 and at most 1 (instead of out reads)",
                batch_table_column: true,
                rule: None,
            },
        ],
    }
}

impl WorkflowMetadata {
    /// Render the metadata using TinyTemplate
    pub fn render(&self) -> Result<String> {
        /// included describe template
        static DESCRIBE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/describe.txt"));
        let mut tt = TinyTemplate::new();
        tt.set_default_formatter(&format_unescaped);
        tt.add_template("describe", DESCRIBE).context("Template")?;
        tt.render("describe", self).context("Rendered metadata")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn render_lists_every_parameter() {
        let rendered = workflow_metadata().render().unwrap();
        assert!(rendered.starts_with("downsample reads\n"));
        for flag in ["--r1", "--r2", "--out-dir", "--out-reads", "--sample-rate"] {
            assert!(rendered.contains(flag), "{flag} missing from:\n{rendered}");
        }
        assert!(rendered.contains("rule: ^[^/].*"));
    }

    #[test]
    fn parameters_match_request_schema() {
        let schema: Value = serde_json::from_str(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/data/schema/request.json"
        )))
        .unwrap();
        let properties = schema["properties"].as_object().unwrap();
        let mut names: Vec<&str> = workflow_metadata().parameters.iter().map(|p| p.name).collect();
        names.push("name");
        assert_eq!(names.len(), properties.len());
        for name in names {
            assert!(properties.contains_key(name), "{name} not in request schema");
        }
    }
}
