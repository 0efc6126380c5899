//! Read files and the remote storage they are published to

/// Remote roots and the `downsampled/<out_dir>/<file>` locators beneath them
pub mod locator;
pub mod read_file;
/// Upload outputs to S3 compatible object storage
pub mod publish;
