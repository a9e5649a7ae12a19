// ============================================================
// Layer 5 — Named Parameters
// ============================================================
// Burn identifies parameters by opaque ids, but checkpoints in
// this project are keyed by readable, scoped names such as
//
//   generator/embedding_attention_seq2seq_context/decoder/cell/hidden_gates/weight
//
// Every module that owns parameters implements NamedParams to
// list them under a Scope and to accept new values for them.
// Composite modules just forward to their children with
// `scope.child("field_name")`, so the final name is the path of
// field names from the model root down to the tensor.

use anyhow::{anyhow, bail, Result};
use burn::{
    module::Param,
    nn::{Embedding, Linear},
    prelude::*,
    tensor::TensorData,
};

use crate::domain::params::{AssignReport, ParamArray, ParamDict};

/// A `/`-separated naming prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    path: String,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self { path: name.into() }
    }

    /// Nested scope `self/name`
    pub fn child(&self, name: &str) -> Self {
        if self.path.is_empty() {
            Self::new(name)
        } else {
            Self::new(format!("{}/{}", self.path, name))
        }
    }

    /// Fully qualified name of a tensor living directly in this scope
    pub fn qualify(&self, leaf: &str) -> String {
        self.child(leaf).path
    }

    /// Plain prefix match, the same rule used to filter saved parameters
    pub fn owns(&self, full_name: &str) -> bool {
        full_name.starts_with(&self.path)
    }
}

/// Modules whose trainable tensors can be listed and replaced by name.
pub trait NamedParams<B: Backend>: Sized {
    /// Insert a snapshot of every parameter under `scope` into `out`.
    fn visit_params(&self, scope: &Scope, out: &mut ParamDict) -> Result<()>;

    /// Replace every parameter found in `vals`; the rest stay as they are.
    fn assign_params(
        self,
        scope:  &Scope,
        vals:   &ParamDict,
        report: &mut AssignReport,
    ) -> Result<Self>;
}

/// Read one parameter off the device.
pub fn snapshot<B: Backend, const D: usize>(param: &Param<Tensor<B, D>>) -> Result<ParamArray> {
    let tensor = param.val();
    let shape  = tensor.dims().to_vec();
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("cannot read parameter values: {e:?}"))?;
    Ok(ParamArray::new(shape, values))
}

/// Replace one parameter's value if `vals` has an entry for `name`.
/// The parameter id is kept, so optimiser state stays attached.
pub fn restore<B: Backend, const D: usize>(
    param:  Param<Tensor<B, D>>,
    name:   String,
    vals:   &ParamDict,
    report: &mut AssignReport,
) -> Result<Param<Tensor<B, D>>> {
    let Some(array) = vals.get(&name) else {
        report.untouched.push(name);
        return Ok(param);
    };

    let dims = param.val().dims();
    if array.shape.as_slice() != dims.as_slice() || !array.is_consistent() {
        bail!(
            "parameter '{}' has shape {:?}, checkpoint provides {:?} ({} values)",
            name, dims, array.shape, array.values.len()
        );
    }

    let param = param.map(|old| {
        let data  = TensorData::new(array.values.clone(), array.shape.clone());
        let fresh = Tensor::<B, D>::from_data(data, &old.device());
        if old.is_require_grad() { fresh.require_grad() } else { fresh }
    });
    report.assigned.push(name);
    Ok(param)
}

/// Check that every entry of `vals` that names an existing parameter
/// fits it, so an assignment can never stop half way.
pub fn validate_against(current: &ParamDict, vals: &ParamDict) -> Result<()> {
    for (name, array) in vals {
        let Some(existing) = current.get(name) else { continue };
        if existing.shape != array.shape {
            bail!(
                "shape mismatch for '{}': model has {:?}, checkpoint has {:?}",
                name, existing.shape, array.shape
            );
        }
        if !array.is_consistent() {
            bail!(
                "checkpoint entry '{}' holds {} values for shape {:?}",
                name, array.values.len(), array.shape
            );
        }
    }
    Ok(())
}

// ─── Leaf modules ─────────────────────────────────────────────────────────────

impl<B: Backend> NamedParams<B> for Linear<B> {
    fn visit_params(&self, scope: &Scope, out: &mut ParamDict) -> Result<()> {
        out.insert(scope.qualify("weight"), snapshot(&self.weight)?);
        if let Some(bias) = &self.bias {
            out.insert(scope.qualify("bias"), snapshot(bias)?);
        }
        Ok(())
    }

    fn assign_params(
        mut self,
        scope:  &Scope,
        vals:   &ParamDict,
        report: &mut AssignReport,
    ) -> Result<Self> {
        self.weight = restore(self.weight, scope.qualify("weight"), vals, report)?;
        self.bias = match self.bias {
            Some(bias) => Some(restore(bias, scope.qualify("bias"), vals, report)?),
            None       => None,
        };
        Ok(self)
    }
}

impl<B: Backend> NamedParams<B> for Embedding<B> {
    fn visit_params(&self, scope: &Scope, out: &mut ParamDict) -> Result<()> {
        out.insert(scope.qualify("weight"), snapshot(&self.weight)?);
        Ok(())
    }

    fn assign_params(
        mut self,
        scope:  &Scope,
        vals:   &ParamDict,
        report: &mut AssignReport,
    ) -> Result<Self> {
        self.weight = restore(self.weight, scope.qualify("weight"), vals, report)?;
        Ok(self)
    }
}

impl<B: Backend, M: NamedParams<B>> NamedParams<B> for Option<M> {
    fn visit_params(&self, scope: &Scope, out: &mut ParamDict) -> Result<()> {
        match self {
            Some(module) => module.visit_params(scope, out),
            None         => Ok(()),
        }
    }

    fn assign_params(
        self,
        scope:  &Scope,
        vals:   &ParamDict,
        report: &mut AssignReport,
    ) -> Result<Self> {
        self.map(|module| module.assign_params(scope, vals, report)).transpose()
    }
}
