//! `make-iso`: package user-data, meta-data and network-config as a cidata image

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{debug, info};

use super::{CommandArgs, required};
use crate::CidataError;
use crate::cli::CommandKind;
use crate::iso::{FinalizeOptions, IsoWriter, SECTOR_SIZE, Timestamp};

pub const META_DATA_FILE: &str = "meta-data";
pub const USER_DATA_FILE: &str = "user-data";
pub const NETWORK_CONFIG_FILE: &str = "network-config";

#[derive(Debug, Parser)]
#[command(name = "make-iso", about = "Make an ISO image", disable_version_flag = true)]
pub struct MakeIsoArgs {
    /// Input user-data YAML file (required)
    #[arg(long = "user-data", value_name = "PATH")]
    pub user_data: Option<PathBuf>,

    /// Input meta-data YAML file; an empty meta-data is written when omitted
    #[arg(long = "meta-data", value_name = "PATH")]
    pub meta_data: Option<PathBuf>,

    /// Input network-config YAML file
    #[arg(long = "network-config", value_name = "PATH")]
    pub network_config: Option<PathBuf>,

    /// Output ISO image file (required)
    #[arg(long = "out", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Timestamp recorded in the image, in seconds since the Unix epoch
    #[arg(long = "source-date-epoch", env = "SOURCE_DATE_EPOCH", value_name = "SECS")]
    pub source_date_epoch: Option<i64>,
}

impl MakeIsoArgs {
    pub fn into_options(self) -> Result<MakeIso, CidataError> {
        let kind = Self::KIND;
        Ok(MakeIso {
            user_data: required(self.user_data, kind, "user-data")?,
            meta_data: self.meta_data,
            network_config: self.network_config,
            output: required(self.output, kind, "out")?,
            source_date_epoch: self.source_date_epoch,
        })
    }
}

impl CommandArgs for MakeIsoArgs {
    const KIND: CommandKind = CommandKind::MakeIso;

    fn execute(self) -> Result<(), CidataError> {
        self.into_options()?.run()
    }
}

/// Resolved `make-iso` options
#[derive(Debug, Clone)]
pub struct MakeIso {
    pub user_data: PathBuf,
    pub meta_data: Option<PathBuf>,
    pub network_config: Option<PathBuf>,
    pub output: PathBuf,
    pub source_date_epoch: Option<i64>,
}

impl MakeIso {
    /// Build the image
    ///
    /// The output is truncated first; a failure part-way leaves an incomplete
    /// image behind.
    pub fn run(&self) -> Result<(), CidataError> {
        let file = File::create(&self.output).map_err(|e| CidataError::write(&self.output, e))?;
        let mut iso = IsoWriter::create(BufWriter::new(file), SECTOR_SIZE)?;
        iso.mkdir("/")?;

        match &self.meta_data {
            Some(path) => copy_into(&mut iso, META_DATA_FILE, path)?,
            None => {
                debug!("No meta-data given, writing an empty one");
                iso.add_file(META_DATA_FILE, &[])?;
            }
        }
        copy_into(&mut iso, USER_DATA_FILE, &self.user_data)?;
        if let Some(path) = &self.network_config {
            copy_into(&mut iso, NETWORK_CONFIG_FILE, path)?;
        }

        let options = FinalizeOptions {
            recorded_at: self.source_date_epoch.map(Timestamp::from_unix),
            ..FinalizeOptions::cidata()
        };
        iso.finalize(&options)?;
        info!("Wrote ISO image to {}", self.output.display());
        Ok(())
    }
}

/// Stream a local file into a root entry of the image
fn copy_into<W: io::Write>(
    iso: &mut IsoWriter<W>,
    name: &str,
    source: &Path,
) -> Result<(), CidataError> {
    let mut input = File::open(source).map_err(|e| CidataError::read(source, e))?;
    let mut dest = iso.open_file(name)?;
    let copied = io::copy(&mut input, &mut dest).map_err(|e| CidataError::read(source, e))?;
    debug!("Copied {} bytes from {} to {}", copied, source.display(), name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iso::open_image;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_required_flags() {
        let args = MakeIsoArgs::try_parse_from(["make-iso", "--out", "seed.iso"]).unwrap();
        assert!(matches!(
            args.into_options(),
            Err(CidataError::RequiredOption {
                command: CommandKind::MakeIso,
                option: "user-data"
            })
        ));

        let args = MakeIsoArgs::try_parse_from(["make-iso", "--user-data", "u"]).unwrap();
        assert!(matches!(
            args.into_options(),
            Err(CidataError::RequiredOption { option: "out", .. })
        ));
    }

    #[test]
    fn test_without_optional_inputs() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("user-data"), "#cloud-config\n").unwrap();

        let opts = MakeIso {
            user_data: temp.path().join("user-data"),
            meta_data: None,
            network_config: None,
            output: temp.path().join("seed.iso"),
            source_date_epoch: Some(0),
        };
        opts.run().unwrap();

        let image = open_image(&opts.output).unwrap();
        assert_eq!(image.volume_identifier, "cidata");
        assert!(image.rock_ridge);
        assert_eq!(image.file_names(), vec!["meta-data", "user-data"]);
        assert!(image.file("meta-data").unwrap().data.is_empty());
        assert_eq!(image.file("user-data").unwrap().data, b"#cloud-config\n");
    }

    #[test]
    fn test_missing_user_data_leaves_truncated_output() {
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("seed.iso");
        fs::write(&output, "previous contents").unwrap();

        let opts = MakeIso {
            user_data: temp.path().join("missing"),
            meta_data: None,
            network_config: None,
            output: output.clone(),
            source_date_epoch: None,
        };
        assert!(matches!(opts.run(), Err(CidataError::Read { .. })));
        assert_eq!(fs::metadata(&output).unwrap().len(), 0);
    }
}
