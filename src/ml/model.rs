// ============================================================
// Layer 5 — Scoped Model Wrapper
// ============================================================
// ScopedModel is the save/load surface shared by every model in
// this crate. A model instance owns:
//
//   • a scope name      — prefix of all its parameter names
//   • a settings struct — hyperparameters, persisted as JSON
//   • a live network    — the Burn module holding the weights
//
// and exposes four operations:
//
//   get_all_settings   settings → JSON-serialisable struct
//   load_all_settings  JSON object merged into the current settings
//   get_model_params   live weights → ParamDict
//   set_model_params   ParamDict → live weights
//
// Seq2SeqGenerator is the dual-encoder implementation.

use anyhow::{bail, Context, Result};
use burn::prelude::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::data::dataset::EOS_ID;
use crate::domain::params::{AssignReport, ParamDict};
use crate::ml::cell::{CellKind, RecurrentCellConfig};
use crate::ml::params::{validate_against, NamedParams, Scope};
use crate::ml::seq2seq::{DualEncoderSeq2Seq, DualEncoderSeq2SeqConfig, NETWORK_SCOPE};

/// Scope used when the caller does not pick one
pub const DEFAULT_SCOPE_NAME: &str = "generator";

pub trait ScopedModel<B: Backend> {
    type Settings: Clone + Serialize + DeserializeOwned;
    type Network: NamedParams<B>;

    fn scope_name(&self) -> &str;

    /// All settings except the trained parameters.
    fn get_all_settings(&self) -> Self::Settings;

    fn settings_mut(&mut self) -> &mut Self::Settings;

    fn network(&self) -> Option<&Self::Network>;

    fn take_network(&mut self) -> Option<Self::Network>;

    fn bind(&mut self, network: Self::Network);

    /// Reject settings the network cannot be built or trained with.
    fn check_settings(&self, _settings: &Self::Settings) -> Result<()> {
        Ok(())
    }

    /// Scope the network's parameters are registered under.
    fn param_scope(&self) -> Scope {
        Scope::new(self.scope_name())
    }

    /// Merge a flat JSON object into the current settings.
    ///
    /// Known keys replace the current value; unknown keys are logged and
    /// dropped. The merged result must still deserialize and pass
    /// `check_settings`; otherwise the current settings stay.
    fn load_all_settings(&mut self, settings: &Value) -> Result<()> {
        let Value::Object(incoming) = settings else {
            bail!("settings must be a JSON object");
        };

        let mut merged = serde_json::to_value(self.get_all_settings())?;
        let Value::Object(current) = &mut merged else {
            bail!("settings of '{}' do not serialise to an object", self.scope_name());
        };

        for (key, value) in incoming {
            if current.contains_key(key) {
                current.insert(key.clone(), value.clone());
            } else {
                tracing::warn!("Ignoring unknown setting '{}'", key);
            }
        }

        let merged: Self::Settings = serde_json::from_value(merged)
            .with_context(|| format!("Invalid settings for '{}'", self.scope_name()))?;
        self.check_settings(&merged)?;

        *self.settings_mut() = merged;
        Ok(())
    }

    /// Current values of every parameter whose name starts with the scope name.
    fn get_model_params(&self) -> Result<ParamDict> {
        let network = self.network().with_context(|| {
            format!("Model '{}' has no network bound", self.scope_name())
        })?;

        let mut params = ParamDict::new();
        network.visit_params(&self.param_scope(), &mut params)?;
        let owner = Scope::new(self.scope_name());
        params.retain(|name, _| owner.owns(name));
        Ok(params)
    }

    /// Assign every in-scope parameter that has an entry in `vals`.
    ///
    /// Parameters without an entry keep their value and keys that match
    /// nothing are skipped; both are listed in the report. A shape
    /// mismatch fails before anything is changed.
    fn set_model_params(&mut self, vals: &ParamDict) -> Result<AssignReport> {
        let current = self.get_model_params()?;
        validate_against(&current, vals)?;

        let scope   = self.param_scope();
        let network = self.take_network().with_context(|| {
            format!("Model '{}' has no network bound", self.scope_name())
        })?;

        let mut report = AssignReport::default();
        let network = network.assign_params(&scope, vals, &mut report)?;
        self.bind(network);
        report.collect_ignored(vals);

        if report.is_exact() {
            tracing::info!(
                "Assigned all {} parameters of '{}'",
                report.assigned.len(),
                self.scope_name()
            );
            return Ok(report);
        }

        tracing::info!(
            "Assigned {} parameters to '{}'",
            report.assigned.len(),
            self.scope_name()
        );
        if !report.untouched.is_empty() {
            tracing::warn!(
                "{} parameters of '{}' had no saved value: {:?}",
                report.untouched.len(),
                self.scope_name(),
                report.untouched
            );
        }
        if !report.ignored.is_empty() {
            tracing::warn!(
                "{} saved values matched no parameter of '{}': {:?}",
                report.ignored.len(),
                self.scope_name(),
                report.ignored
            );
        }

        Ok(report)
    }
}

// ─── Generator settings ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSettings {
    pub cell_type:           CellKind,
    /// Units per encoder; the decoder gets twice as many
    pub units:               usize,
    pub num_heads:           usize,
    pub external_projection: bool,
    /// Symbols shared by the encoders and the decoder
    pub vocab_size:          usize,
    /// Tokens kept per encoder half
    pub max_input_len:       usize,
    /// Decoder steps, <go> included
    pub max_output_len:      usize,
    pub batch_size:          usize,
    pub epochs:              usize,
    pub lr:                  f64,
    pub max_grad_norm:       f32,
    /// Chance that a training example decodes from its own predictions
    pub feed_previous_prob:  f64,
    pub seed:                u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            cell_type:           CellKind::Lstm,
            units:               128,
            num_heads:           1,
            external_projection: false,
            vocab_size:          5000,
            max_input_len:       20,
            max_output_len:      40,
            batch_size:          20,
            epochs:              20,
            lr:                  1e-3,
            max_grad_norm:       5.0,
            feed_previous_prob:  0.0,
            seed:                1206,
        }
    }
}

impl GeneratorSettings {
    /// Sizes that must be non-zero for a network to be built and fed.
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("units",          self.units),
            ("num_heads",      self.num_heads),
            ("max_input_len",  self.max_input_len),
            ("max_output_len", self.max_output_len),
            ("batch_size",     self.batch_size),
        ];
        for (name, value) in sizes {
            if value == 0 {
                bail!("setting '{}' must be at least 1", name);
            }
        }
        if self.vocab_size <= EOS_ID as usize {
            bail!(
                "vocab_size {} leaves no room past the special tokens",
                self.vocab_size
            );
        }
        Ok(())
    }

    pub fn network_config(&self) -> DualEncoderSeq2SeqConfig {
        DualEncoderSeq2SeqConfig::new(
            RecurrentCellConfig::new(self.cell_type, self.units),
            self.vocab_size,
            self.vocab_size,
        )
        .with_num_heads(self.num_heads)
        .with_external_projection(self.external_projection)
    }
}

// ─── Seq2SeqGenerator ─────────────────────────────────────────────────────────

pub struct Seq2SeqGenerator<B: Backend> {
    scope_name: String,
    settings:   GeneratorSettings,
    network:    Option<DualEncoderSeq2Seq<B>>,
    device:     B::Device,
}

impl<B: Backend> Seq2SeqGenerator<B> {
    pub fn new(scope_name: impl Into<String>, settings: GeneratorSettings, device: B::Device) -> Self {
        Self {
            scope_name: scope_name.into(),
            settings,
            network: None,
            device,
        }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Create a freshly initialised network from the current settings and
    /// bind it, replacing any previous one.
    pub fn build_network(&mut self) -> &DualEncoderSeq2Seq<B> {
        let network = self.settings.network_config().init(&self.device);
        tracing::debug!(
            "Built {} network: units={}, heads={}, vocab={}",
            self.settings.cell_type,
            self.settings.units,
            self.settings.num_heads,
            self.settings.vocab_size
        );
        self.network.insert(network)
    }
}

impl<B: Backend> ScopedModel<B> for Seq2SeqGenerator<B> {
    type Settings = GeneratorSettings;
    type Network  = DualEncoderSeq2Seq<B>;

    fn scope_name(&self) -> &str {
        &self.scope_name
    }

    fn get_all_settings(&self) -> GeneratorSettings {
        self.settings.clone()
    }

    fn settings_mut(&mut self) -> &mut GeneratorSettings {
        &mut self.settings
    }

    fn network(&self) -> Option<&DualEncoderSeq2Seq<B>> {
        self.network.as_ref()
    }

    fn take_network(&mut self) -> Option<DualEncoderSeq2Seq<B>> {
        self.network.take()
    }

    fn bind(&mut self, network: DualEncoderSeq2Seq<B>) {
        self.network = Some(network);
    }

    fn check_settings(&self, settings: &GeneratorSettings) -> Result<()> {
        settings.validate()
    }

    fn param_scope(&self) -> Scope {
        Scope::new(self.scope_name()).child(NETWORK_SCOPE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::params::ParamArray;
    use burn::backend::NdArray;
    use serde_json::json;

    type TestBackend = NdArray;

    fn tiny_settings() -> GeneratorSettings {
        GeneratorSettings {
            cell_type:  CellKind::Gru,
            units:      4,
            vocab_size: 9,
            ..Default::default()
        }
    }

    fn generator(scope: &str) -> Seq2SeqGenerator<TestBackend> {
        let mut g = Seq2SeqGenerator::new(scope, tiny_settings(), Default::default());
        g.build_network();
        g
    }

    #[test]
    fn test_load_all_settings_merges_known_keys() {
        let mut g = generator("gen");
        g.load_all_settings(&json!({"units": 32, "lr": 0.5, "beam_size": 10}))
            .unwrap();

        assert_eq!(g.settings().units, 32);
        assert_eq!(g.settings().lr, 0.5);
        // Untouched keys keep their value
        assert_eq!(g.settings().vocab_size, 9);
    }

    #[test]
    fn test_load_all_settings_rejects_bad_input() {
        let mut g = generator("gen");
        assert!(g.load_all_settings(&json!([1, 2, 3])).is_err());
        assert!(g.load_all_settings(&json!({"units": "many"})).is_err());
        // A failed merge leaves the settings alone
        assert_eq!(g.settings().units, 4);
    }

    #[test]
    fn test_load_all_settings_rejects_zero_lengths() {
        let mut g = generator("gen");
        assert!(g.load_all_settings(&json!({"max_output_len": 0})).is_err());
        assert!(g.load_all_settings(&json!({"max_input_len": 0})).is_err());
        assert!(g.load_all_settings(&json!({"vocab_size": 3})).is_err());

        assert_eq!(g.get_all_settings(), tiny_settings());
    }

    #[test]
    fn test_default_settings_are_valid() {
        assert!(GeneratorSettings::default().validate().is_ok());
        assert!(tiny_settings().validate().is_ok());
    }

    #[test]
    fn test_settings_survive_json_round_trip() {
        let g = generator("gen");
        let json = serde_json::to_value(g.get_all_settings()).unwrap();
        assert_eq!(json["cell_type"], "gru");

        let mut other = Seq2SeqGenerator::<TestBackend>::new(
            "other",
            GeneratorSettings::default(),
            Default::default(),
        );
        other.load_all_settings(&json).unwrap();
        assert_eq!(other.get_all_settings(), g.get_all_settings());
    }

    #[test]
    fn test_get_model_params_needs_a_network() {
        let g = Seq2SeqGenerator::<TestBackend>::new("gen", tiny_settings(), Default::default());
        assert!(g.get_model_params().is_err());
    }

    #[test]
    fn test_param_names_are_scoped() {
        let g = generator("gen");
        let params = g.get_model_params().unwrap();

        assert!(!params.is_empty());
        assert!(params
            .keys()
            .all(|k| k.starts_with("gen/embedding_attention_seq2seq_context/")));
    }

    #[test]
    fn test_params_transfer_between_instances() {
        let source = generator("gen");
        let mut target = generator("gen");
        let saved = source.get_model_params().unwrap();
        assert_ne!(saved, target.get_model_params().unwrap());

        let report = target.set_model_params(&saved).unwrap();

        assert!(report.is_exact());
        assert_eq!(report.assigned.len(), saved.len());
        assert_eq!(target.get_model_params().unwrap(), saved);
    }

    #[test]
    fn test_partial_and_foreign_entries_are_reported() {
        let source = generator("gen");
        let mut target = generator("gen");
        let before = target.get_model_params().unwrap();

        let mut saved = source.get_model_params().unwrap();
        let kept = "gen/embedding_attention_seq2seq_context/context_rnn/embedding/weight";
        saved.retain(|name, _| name == kept);
        saved.insert("other/decoder/weight".into(), ParamArray::new(vec![1], vec![0.0]));

        let report = target.set_model_params(&saved).unwrap();
        let after = target.get_model_params().unwrap();

        assert_eq!(report.assigned, vec![kept.to_string()]);
        assert_eq!(report.ignored, vec!["other/decoder/weight".to_string()]);
        assert_eq!(report.untouched.len(), before.len() - 1);
        assert_eq!(after[kept], saved[kept]);
        let untouched = "gen/embedding_attention_seq2seq_context/input_rnn/embedding/weight";
        assert_eq!(after[untouched], before[untouched]);
    }

    #[test]
    fn test_shape_mismatch_changes_nothing() {
        let mut target = generator("gen");
        let before = target.get_model_params().unwrap();

        let mut saved = before.clone();
        let first = "gen/embedding_attention_seq2seq_context/context_rnn/cell/hidden_gates/weight";
        let last  = "gen/embedding_attention_seq2seq_context/input_rnn/embedding/weight";
        saved.insert(first.into(), ParamArray::new(vec![4, 12], vec![0.5; 48]));
        saved.insert(last.into(), ParamArray::new(vec![2, 2], vec![0.0; 4]));

        assert!(target.set_model_params(&saved).is_err());
        // Network still bound and untouched
        assert_eq!(target.get_model_params().unwrap(), before);
    }

    #[test]
    fn test_other_scope_is_not_loaded() {
        let source = generator("first");
        let mut target = generator("second");

        let report = target.set_model_params(&source.get_model_params().unwrap()).unwrap();
        assert!(report.assigned.is_empty());
        assert_eq!(report.ignored.len(), report.untouched.len());
    }
}
