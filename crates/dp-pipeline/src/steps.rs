//! The built-in packaging steps, in pipeline order.

use async_trait::async_trait;

use dp_bag::BagInfo;
use dp_core::{DestinationRole, PackageFormat, Result};

use crate::classify::{classify, list_staged_files};
use crate::cleanup;
use crate::collaborators::RegistrySettings;
use crate::context::{JobState, RunContext};
use crate::delivery::{DeliveryAgent, PACKAGE_CONTENT_TYPE};
use crate::notifier::Notifier;
use crate::plan::plan;
use crate::resolver::MetadataResolver;
use crate::step::Step;

/// Every step of the pipeline in execution order.
pub fn standard_steps() -> Vec<Box<dyn Step>> {
    vec![
        Box::new(LoadConfiguration),
        Box::new(StageObject),
        Box::new(ClassifyFormat),
        Box::new(GeneratePoster),
        Box::new(DeliverDerivatives),
        Box::new(BuildEnvelope),
        Box::new(CompressEnvelope),
        Box::new(DeliverPackage),
        Box::new(CleanupSource),
        Box::new(NotifySuccess),
    ]
}

fn delivery_agent(ctx: &RunContext) -> Result<DeliveryAgent> {
    Ok(DeliveryAgent::new(
        ctx.factory.object_store()?,
        ctx.options.transfer.clone(),
    ))
}

/// Fetch the registry settings and connect to the registry.
pub struct LoadConfiguration;

#[async_trait]
impl Step for LoadConfiguration {
    fn reaches(&self) -> JobState {
        JobState::Configured
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<()> {
        let params = ctx
            .factory
            .parameter_store()?
            .get_parameters_by_path(&ctx.options.parameter_path)
            .await?;
        let settings = RegistrySettings::from_parameters(&params)?;
        tracing::debug!("Registry settings: {:?}", settings);
        let registry = ctx.factory.registry(&settings).await?;
        ctx.set_resolver(MetadataResolver::new(registry));
        Ok(())
    }
}

/// Copy the source object into the working directory.
pub struct StageObject;

#[async_trait]
impl Step for StageObject {
    fn reaches(&self) -> JobState {
        JobState::Staged
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<()> {
        cleanup::stage(&ctx.job)?;
        Ok(())
    }
}

/// Derive the package format from the staged files.
pub struct ClassifyFormat;

#[async_trait]
impl Step for ClassifyFormat {
    fn reaches(&self) -> JobState {
        JobState::Classified
    }

    fn applies(&self, ctx: &RunContext) -> bool {
        ctx.job.variant().classifies()
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<()> {
        let files = list_staged_files(&ctx.job.bag_dir())?;
        ctx.format = classify(&files)?;
        tracing::debug!("{} classified as {}", ctx.job.refid(), ctx.format);
        Ok(())
    }
}

/// Extract the poster frame of a video.
pub struct GeneratePoster;

#[async_trait]
impl Step for GeneratePoster {
    fn reaches(&self) -> JobState {
        JobState::PosterGenerated
    }

    fn applies(&self, ctx: &RunContext) -> bool {
        ctx.format == PackageFormat::Video
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<()> {
        dp_av::generate_poster(&ctx.tools, &ctx.job.bag_dir()).await?;
        Ok(())
    }
}

/// Upload access and mezzanine derivatives before bagging.
pub struct DeliverDerivatives;

#[async_trait]
impl Step for DeliverDerivatives {
    fn reaches(&self) -> JobState {
        JobState::DerivativesDelivered
    }

    fn applies(&self, ctx: &RunContext) -> bool {
        ctx.job.variant().classifies()
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<()> {
        let staged = list_staged_files(&ctx.job.bag_dir())?;
        let plan = plan(ctx.format, &ctx.job, &staged)?;
        tracing::debug!("Delivering {} derivatives", plan.len());
        delivery_agent(ctx)?.deliver_plan(&plan).await
    }
}

/// Resolve registry metadata and write the bag.
pub struct BuildEnvelope;

#[async_trait]
impl Step for BuildEnvelope {
    fn reaches(&self) -> JobState {
        JobState::Enveloped
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<()> {
        let metadata = ctx.resolver()?.resolve(ctx.job.refid()).await?;
        let info = BagInfo {
            archivesspace_uri: metadata.uri,
            start_date: metadata.dates.start_string(),
            end_date: metadata.dates.end_string(),
            origin: ctx.job.variant().origin().to_string(),
            rights_ids: ctx.job.rights_ids().to_vec(),
            profile_identifier: ctx.options.profile_identifier.clone(),
        };
        let report = dp_bag::make_bag(&ctx.job.bag_dir(), &info)?;
        tracing::debug!(
            "Bagged {} files ({} bytes)",
            report.payload_files,
            report.payload_bytes
        );
        Ok(())
    }
}

/// Serialize the bag into `<refid>.tar.gz`.
pub struct CompressEnvelope;

#[async_trait]
impl Step for CompressEnvelope {
    fn reaches(&self) -> JobState {
        JobState::Compressed
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<()> {
        let archive = dp_bag::compress(&ctx.job.bag_dir())?;
        tracing::debug!("Compressed package at {}", archive.display());
        Ok(())
    }
}

/// Upload the compressed package.
pub struct DeliverPackage;

#[async_trait]
impl Step for DeliverPackage {
    fn reaches(&self) -> JobState {
        JobState::Delivered
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<()> {
        let archive = ctx.job.archive_path();
        let key = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let destination = ctx.job.destinations().get(DestinationRole::Package)?;
        delivery_agent(ctx)?
            .upload(&archive, destination, &key, PACKAGE_CONTENT_TYPE)
            .await
    }
}

/// Remove the source object.
pub struct CleanupSource;

#[async_trait]
impl Step for CleanupSource {
    fn reaches(&self) -> JobState {
        JobState::CleanedUp
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<()> {
        cleanup::cleanup_success(&ctx.job)
    }
}

/// Publish the success event.
pub struct NotifySuccess;

#[async_trait]
impl Step for NotifySuccess {
    fn reaches(&self) -> JobState {
        JobState::Notified
    }

    async fn execute(&self, ctx: &mut RunContext) -> Result<()> {
        Notifier::new(ctx.factory.pubsub()?)
            .notify_success(&ctx.job, ctx.format)
            .await
    }
}
