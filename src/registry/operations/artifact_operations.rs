//! Artifact-level push and pull built on the blob and manifest operations

use crate::error::{Phase, RegistryError, Result};
use crate::image::artifact::{Layer, Manifest};
use crate::image::descriptor::{Descriptor, EMPTY_CONTENT};
use crate::image::manifest::ManifestOrIndex;
use crate::registry::client::RegistryClient;
use crate::registry::reference::{validate_name, validate_reference};
use url::Url;

impl RegistryClient {
    /// Push every blob of `manifest`, then the manifest itself under `tag`
    ///
    /// Blobs are uploaded one after another. A failure aborts before the
    /// manifest is written; blobs already uploaded stay on the registry.
    pub async fn push(&self, name: &str, tag: &str, manifest: &Manifest) -> Result<Option<Url>> {
        validate_name(name)?;
        validate_reference(tag)?;
        self.output.section(&format!("Pushing {}:{}", name, tag));

        let result = self.push_artifact(name, tag, manifest).await;
        if let Err(err) = &result {
            self.output
                .error(&format!("Push of {}:{} aborted: {}", name, tag, err));
        }
        result
    }

    /// Fetch the manifest under `tag` and every layer it lists, verified
    ///
    /// An index is refused; resolve it to a platform manifest and pull by digest.
    pub async fn pull(&self, name: &str, tag: &str) -> Result<Manifest> {
        self.output.section(&format!("Pulling {}:{}", name, tag));

        let result = self.pull_artifact(name, tag).await;
        if let Err(err) = &result {
            self.output
                .error(&format!("Pull of {}:{} aborted: {}", name, tag, err));
        }
        result
    }

    async fn push_artifact(&self, name: &str, tag: &str, manifest: &Manifest) -> Result<Option<Url>> {
        for (i, layer) in manifest.layers.iter().enumerate() {
            self.output.step(&format!(
                "Layer {}/{}: {}",
                i + 1,
                manifest.layers.len(),
                layer.descriptor().digest.short()
            ));
            self.push_blob(name, layer.blob().clone()).await?;
        }

        let mut empty_pushed = false;
        match manifest.config.embedded_data()? {
            Some(data) => {
                crate::digest::verify_integrity(&manifest.config, &data)?;
                self.push_blob(name, data).await?;
                empty_pushed = manifest.config.is_empty_descriptor();
            }
            None => self.output.detail(&format!(
                "Config {} has no embedded data; expecting it on the registry",
                manifest.config.digest.short()
            )),
        }

        if manifest.uses_empty_layer() && !empty_pushed {
            self.push_blob(name, EMPTY_CONTENT).await?;
        }

        let wire = ManifestOrIndex::Manifest(manifest.serialize());
        self.push_manifest(name, tag, &wire).await
    }

    async fn pull_artifact(&self, name: &str, tag: &str) -> Result<Manifest> {
        let wire = match self.fetch_manifest_or_index(name, tag).await? {
            ManifestOrIndex::Manifest(manifest) => manifest,
            ManifestOrIndex::Index(_) => {
                return Err(RegistryError::protocol(
                    Phase::FetchManifest,
                    None,
                    "reference is an image index, which pull does not resolve",
                )
                .with_target(name, tag));
            }
        };

        // a lone empty layer is the placeholder for "no layers"
        let placeholder_only = wire.layers.len() == 1 && wire.layers[0].is_empty_descriptor();
        let mut layers = Vec::new();
        if !placeholder_only {
            for descriptor in &wire.layers {
                let blob = self.fetch_blob_verified(name, descriptor).await?;
                layers.push(Layer::new(&descriptor.media_type, blob));
            }
        }

        Ok(Manifest {
            artifact_type: wire.artifact_type,
            config: wire.config.unwrap_or_else(Descriptor::empty),
            layers,
            subject: wire.subject,
            annotations: wire.annotations,
        })
    }
}
