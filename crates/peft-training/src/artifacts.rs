use crate::error::{TuneError, TuneResult};
use serde::{Deserialize, Serialize};

/// Object-storage locations written by one training job.
///
/// Both locations are allocated before the job starts and are write-once:
/// the job populates them, deployment only reads the merged model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub adapter_dir: String,
    pub merged_model_dir: String,
}

impl Artifact {
    /// Allocate `<bucket>/<job_name>/adapter` and `<bucket>/<job_name>/merged-model`.
    pub fn allocate(bucket_uri: &str, job_name: &str) -> TuneResult<Self> {
        let base = job_output_dir(bucket_uri, job_name)?;
        Ok(Self {
            adapter_dir: format!("{base}/adapter"),
            merged_model_dir: format!("{base}/merged-model"),
        })
    }
}

/// Root directory for everything one job writes.
pub fn job_output_dir(bucket_uri: &str, job_name: &str) -> TuneResult<String> {
    let bucket = bucket_uri.trim().trim_end_matches('/');
    if !bucket.starts_with("gs://") || bucket.len() <= "gs://".len() {
        return Err(TuneError::InvalidSpec(format!("bucket uri must look like gs://<bucket>, got '{bucket_uri}'")));
    }
    if job_name.trim().is_empty() {
        return Err(TuneError::InvalidSpec("job name is required".to_string()));
    }
    Ok(format!("{bucket}/{}", job_name.trim()))
}

/// Path under which a `gs://` location is mounted inside platform containers.
#[must_use]
pub fn to_fuse_path(uri: &str) -> String {
    uri.strip_prefix("gs://").map_or_else(|| uri.to_string(), |rest| format!("/gcs/{rest}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_layout() {
        let artifact = Artifact::allocate("gs://my-bucket/", "peft-job-1").unwrap();
        assert_eq!(artifact.adapter_dir, "gs://my-bucket/peft-job-1/adapter");
        assert_eq!(artifact.merged_model_dir, "gs://my-bucket/peft-job-1/merged-model");
    }

    #[test]
    fn test_allocate_rejects_non_gcs_bucket() {
        assert!(Artifact::allocate("/tmp/bucket", "job").is_err());
        assert!(Artifact::allocate("gs://", "job").is_err());
        assert!(Artifact::allocate("gs://bucket", " ").is_err());
    }

    #[test]
    fn test_fuse_path() {
        assert_eq!(to_fuse_path("gs://b/x/adapter"), "/gcs/b/x/adapter");
        assert_eq!(to_fuse_path("org/dataset"), "org/dataset");
    }
}
