use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use digipack::{DestinationSet, Job, PipelineVariant, RefId};

#[derive(Parser)]
#[command(name = "digipack")]
#[command(author, version, about = "Packages digitized archival objects for preservation")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Package a single archival object
    Run(RunArgs),

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Validate a BagIt bag on disk
    VerifyBag {
        /// Bag directory
        dir: PathBuf,
    },

    /// Display version information
    Version,
}

#[derive(Args)]
pub struct RunArgs {
    /// Reference id of the archival object
    #[arg(long, env = "REFID")]
    pub refid: String,

    /// Comma-separated rights identifiers
    #[arg(long, env = "RIGHTS_IDS")]
    pub rights_ids: String,

    /// Working directory
    #[arg(long, env = "TMP_DIR")]
    pub tmp_dir: PathBuf,

    /// Directory holding the object to package
    #[arg(long, env = "SOURCE_DIR")]
    pub source_dir: PathBuf,

    /// Destination of the compressed package
    #[arg(long, env = "AWS_DESTINATION_BUCKET")]
    pub destination: String,

    /// Destination of video mezzanine files
    #[arg(long, env = "AWS_DESTINATION_BUCKET_VIDEO_MEZZANINE")]
    pub video_mezzanine_destination: Option<String>,

    /// Destination of video access files
    #[arg(long, env = "AWS_DESTINATION_BUCKET_VIDEO_ACCESS")]
    pub video_access_destination: Option<String>,

    /// Destination of video posters
    #[arg(long, env = "AWS_DESTINATION_BUCKET_POSTER")]
    pub poster_destination: Option<String>,

    /// Destination of audio access files
    #[arg(long, env = "AWS_DESTINATION_BUCKET_AUDIO_ACCESS")]
    pub audio_access_destination: Option<String>,

    /// Notification topic
    #[arg(long, env = "AWS_SNS_TOPIC")]
    pub topic: String,

    /// Deployment environment, first segment of the parameter path
    #[arg(long = "env", env = "ENV")]
    pub environment: String,

    /// Application segment of the parameter path
    #[arg(long, env = "APP_CONFIG_PATH")]
    pub app_config_path: String,

    /// Pipeline variant (overrides the config file): image or av
    #[arg(long, env = "PIPELINE_VARIANT", value_parser = parse_variant)]
    pub variant: Option<PipelineVariant>,
}

fn parse_variant(s: &str) -> Result<PipelineVariant, String> {
    match s.to_ascii_lowercase().as_str() {
        "image" => Ok(PipelineVariant::Image),
        "av" | "audiovisual" => Ok(PipelineVariant::AudioVisual),
        other => Err(format!("unknown variant {other:?}; expected image or av")),
    }
}

impl RunArgs {
    /// Parameter store path, `/<env>/<app config path>`.
    pub fn parameter_path(&self) -> String {
        format!(
            "/{}/{}",
            self.environment.trim_matches('/'),
            self.app_config_path.trim_matches('/')
        )
    }

    pub fn to_job(&self, variant: PipelineVariant) -> anyhow::Result<Job> {
        let refid = RefId::new(&self.refid).context("Invalid REFID")?;
        let destinations = DestinationSet {
            package: self.destination.clone(),
            video_mezzanine: self.video_mezzanine_destination.clone(),
            video_access: self.video_access_destination.clone(),
            video_poster: self.poster_destination.clone(),
            audio_access: self.audio_access_destination.clone(),
        };
        let job = Job::new(
            refid,
            &self.rights_ids,
            &self.tmp_dir,
            &self.source_dir,
            destinations,
            variant,
            &self.topic,
        )?;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> RunArgs {
        let mut argv = vec!["digipack", "run"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            _ => panic!("expected run"),
        }
    }

    const REQUIRED: &[&str] = &[
        "--refid", "abc",
        "--rights-ids", "1, 2",
        "--tmp-dir", "/tmp/work",
        "--source-dir", "/source",
        "--destination", "packages",
        "--topic", "packaging",
        "--env", "dev",
        "--app-config-path", "digitized_image_packaging",
    ];

    #[test]
    fn parameter_path_joins_segments() {
        let args = parse(REQUIRED);
        assert_eq!(args.parameter_path(), "/dev/digitized_image_packaging");
    }

    #[test]
    fn builds_job() {
        let args = parse(REQUIRED);
        let job = args.to_job(PipelineVariant::Image).unwrap();
        assert_eq!(job.refid().as_str(), "abc");
        assert_eq!(job.rights_ids(), ["1", "2"]);
        assert_eq!(job.archive_path(), PathBuf::from("/tmp/work/abc.tar.gz"));
    }

    #[test]
    fn variant_flag() {
        let mut argv = REQUIRED.to_vec();
        argv.extend_from_slice(&["--variant", "AV"]);
        assert_eq!(parse(&argv).variant, Some(PipelineVariant::AudioVisual));
    }

    #[test]
    fn bad_refid_rejected() {
        let mut argv = REQUIRED.to_vec();
        argv[1] = "../escape";
        assert!(parse(&argv).to_job(PipelineVariant::Image).is_err());
    }
}
