use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};
use rusoto_core::{HttpClient, Region};
use rusoto_credential::DefaultCredentialsProvider;
use rusoto_s3::{
    AbortMultipartUploadRequest, CompleteMultipartUploadRequest, CompletedMultipartUpload, CompletedPart,
    CreateMultipartUploadRequest, PutObjectRequest, S3Client, UploadPartRequest, S3,
};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::storage::read_file::ReadFile;

/// Files larger than one part are sent as a multipart upload
static PART_SIZE: usize = 64 * 1024 * 1024;

/// Uploads stage outputs to their remote locators
pub struct Publisher {
    client: S3Client,
}

impl Publisher {
    /// Connect to AWS, or to any S3 compatible endpoint (e.g. Allas) if one is set
    pub fn new(endpoint: Option<&str>) -> Result<Publisher> {
        let region = region(endpoint);
        info!("Publishing to S3 region {}", region.name());
        let dispatcher = HttpClient::new().context("Create S3 HTTP client")?;
        let credentials = DefaultCredentialsProvider::new().context("Load S3 credentials")?;
        Ok(Publisher { client: S3Client::new_with(dispatcher, credentials, region) })
    }

    pub async fn publish(&self, file: &ReadFile) -> Result<()> {
        let (bucket, key) = target(file)?;
        let size = tokio::fs::metadata(&file.local_path)
            .await
            .with_context(|| format!("Read metadata of {}", file.local_path.display()))?
            .len();
        info!("Uploading {} ({size} bytes) to s3://{bucket}/{key}", file.local_path.display());

        match size <= PART_SIZE as u64 {
            true => self.put(&file.local_path, bucket, key).await,
            false => self.put_multipart(&file.local_path, bucket, key).await,
        }
    }

    async fn put(&self, path: &Path, bucket: String, key: String) -> Result<()> {
        let body = tokio::fs::read(path).await.with_context(|| format!("Read {}", path.display()))?;
        let request = PutObjectRequest {
            bucket,
            key,
            content_length: Some(body.len() as i64),
            body: Some(body.into()),
            ..Default::default()
        };
        self.client.put_object(request).await.context("PutObject")?;
        Ok(())
    }

    async fn put_multipart(&self, path: &Path, bucket: String, key: String) -> Result<()> {
        let upload = self
            .client
            .create_multipart_upload(CreateMultipartUploadRequest {
                bucket: bucket.clone(),
                key: key.clone(),
                ..Default::default()
            })
            .await
            .context("CreateMultipartUpload")?;
        let upload_id = upload.upload_id.ok_or_else(|| anyhow!("S3 returned no upload id"))?;

        match self.upload_parts(path, &bucket, &key, &upload_id).await {
            Ok(parts) => {
                self.client
                    .complete_multipart_upload(CompleteMultipartUploadRequest {
                        bucket,
                        key,
                        upload_id,
                        multipart_upload: Some(CompletedMultipartUpload { parts: Some(parts) }),
                        ..Default::default()
                    })
                    .await
                    .context("CompleteMultipartUpload")?;
                Ok(())
            }
            Err(err) => {
                warn!("Upload of {} failed, aborting multipart upload {upload_id}", path.display());
                let abort = AbortMultipartUploadRequest { bucket, key, upload_id, ..Default::default() };
                if let Err(abort_err) = self.client.abort_multipart_upload(abort).await {
                    warn!("Can't abort multipart upload: {abort_err}");
                }
                Err(err)
            }
        }
    }

    async fn upload_parts(&self, path: &Path, bucket: &str, key: &str, upload_id: &str) -> Result<Vec<CompletedPart>> {
        let mut file = File::open(path).await.with_context(|| format!("Open {}", path.display()))?;
        let mut parts = Vec::new();
        let mut part_number: i64 = 1;

        loop {
            let mut buffer = vec![0u8; PART_SIZE];
            let filled = read_part(&mut file, &mut buffer).await?;
            if filled == 0 {
                break;
            }
            buffer.truncate(filled);

            info!("Uploading part {part_number} of s3://{bucket}/{key}");
            let uploaded = self
                .client
                .upload_part(UploadPartRequest {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    upload_id: upload_id.to_string(),
                    part_number,
                    content_length: Some(filled as i64),
                    body: Some(buffer.into()),
                    ..Default::default()
                })
                .await
                .with_context(|| format!("UploadPart {part_number}"))?;
            parts.push(CompletedPart { e_tag: uploaded.e_tag, part_number: Some(part_number) });
            part_number += 1;
        }

        Ok(parts)
    }
}

/// Bucket and key of a stage output, only s3:// roots can be published
fn target(file: &ReadFile) -> Result<(String, String)> {
    let remote = match &file.remote {
        Some(remote) => remote,
        None => bail!("{} has no remote locator", file.name),
    };
    remote
        .s3_object()
        .ok_or_else(|| anyhow!("Can't publish to {}, only s3:// remote roots are supported", remote.root()))
}

fn region(endpoint: Option<&str>) -> Region {
    match endpoint {
        Some(endpoint) => Region::Custom { name: "custom".to_string(), endpoint: endpoint.to_string() },
        None => Region::default(),
    }
}

/// Read until the buffer is full or the file ends
async fn read_part(file: &mut File, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = file.read(&mut buffer[filled..]).await.context("Read part")?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::storage::locator::RemoteRoot;

    fn output(root: &str) -> ReadFile {
        let locator = RemoteRoot::parse(root).unwrap().locate("runA", "ds_a_R1.fq");
        ReadFile::published(PathBuf::from("/work/runA/ds_a_R1.fq"), locator).unwrap()
    }

    #[test]
    fn s3_target() {
        let (bucket, key) = target(&output("s3://downsample-dev")).unwrap();
        assert_eq!(bucket, "downsample-dev");
        assert_eq!(key, "downsampled/runA/ds_a_R1.fq");
    }

    #[test]
    fn other_schemes_cannot_be_published() {
        assert!(target(&output("latch:///")).is_err());
        let input = ReadFile::local(Path::new("a_R1.fq")).unwrap();
        assert!(target(&input).is_err());
    }

    #[test]
    fn custom_endpoint_region() {
        match region(Some("https://a3s.fi")) {
            Region::Custom { endpoint, .. } => assert_eq!(endpoint, "https://a3s.fi"),
            other => panic!("expected custom region, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_part_fills_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.fq");
        std::fs::write(&path, b"0123456789").unwrap();
        let mut file = File::open(&path).await.unwrap();
        let mut buffer = [0u8; 4];
        assert_eq!(read_part(&mut file, &mut buffer).await.unwrap(), 4);
        assert_eq!(&buffer, b"0123");
        let mut rest = [0u8; 16];
        assert_eq!(read_part(&mut file, &mut rest).await.unwrap(), 6);
    }
}
