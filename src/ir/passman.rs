//! # Pass Manager
//!
//! The pass manager is a module that provides a consistent interface for
//! running and managing passes on a procedure graph.

use std::{collections::HashMap, str::FromStr};

use thiserror::Error;

use super::Graph;

#[derive(Debug, Error)]
pub enum PassErrorKind {
    #[error("analysis error")]
    AnalysisError,

    #[error("transform error")]
    TransformError,
}

#[derive(Debug, Error)]
#[error("{kind} on {pass_name}: {err}")]
pub struct PassError {
    kind: PassErrorKind,
    err: Box<dyn std::error::Error>,
    pass_name: String,
}

pub type PassResult<T> = Result<T, PassError>;

impl PassError {
    pub fn analysis_error(pass_name: impl Into<String>, err: Box<dyn std::error::Error>) -> Self {
        Self {
            kind: PassErrorKind::AnalysisError,
            err,
            pass_name: pass_name.into(),
        }
    }

    pub fn transform_error(pass_name: impl Into<String>, err: Box<dyn std::error::Error>) -> Self {
        Self {
            kind: PassErrorKind::TransformError,
            err,
            pass_name: pass_name.into(),
        }
    }
}

/// Storage for the parameters of registered passes.
///
/// Parameters are kept as strings and parsed on fetch, so one storage can
/// serve passes with differently typed knobs.
#[derive(Default)]
pub struct ParamStorage {
    params: HashMap<String, String>,
}

impl ParamStorage {
    /// Get a parameter, parsed to the requested type.
    ///
    /// # Returns
    ///
    /// - `Some(value)` if the parameter exists and parses.
    /// - `None` if the parameter is unknown or fails to parse.
    pub fn get<T: FromStr>(&self, name: impl AsRef<str>) -> Option<T> {
        self.params.get(name.as_ref()).and_then(|v| v.parse().ok())
    }
}

/// A pass that can be run on a graph.
pub trait GraphPass {
    /// The output of the pass.
    type Output;

    /// Run the pass on the given graph.
    fn run(&mut self, g: &Graph) -> PassResult<Self::Output>;
}

/// A pass that can be run on a graph and modify it.
pub trait GraphPassMut {
    /// The output of the pass.
    type Output;

    /// Run the pass on the given graph and maybe modify it.
    ///
    /// # Returns
    ///
    /// A tuple of the output of the pass and a boolean indicating whether the
    /// IR has been modified.
    fn run(&mut self, g: &mut Graph) -> PassResult<(Self::Output, bool)>;

    /// Fetch the parameters this pass consumes.
    ///
    /// The pass manager calls this before every run. Passes without
    /// parameters keep the default no-op.
    fn fetch_params(&mut self, _params: &ParamStorage) {}
}

pub trait TransformPass: GraphPassMut<Output = ()> {
    fn register(passman: &mut PassManager)
    where
        Self: Sized;
}

#[derive(Default)]
pub struct PassManager {
    parameters: ParamStorage,
    transforms: HashMap<String, Box<dyn TransformPass>>,
    deps: HashMap<String, Vec<Box<dyn TransformPass>>>,
}

impl PassManager {
    pub fn new() -> Self { Self::default() }

    /// Register a parameter together with its default value.
    pub fn add_parameter(&mut self, name: impl Into<String>, default: impl ToString) {
        self.parameters
            .params
            .insert(name.into(), default.to_string());
    }

    /// Set a registered parameter. Unknown names are ignored.
    pub fn set_parameter(&mut self, name: impl AsRef<str>, value: impl ToString) {
        if let Some(param) = self.parameters.params.get_mut(name.as_ref()) {
            *param = value.to_string();
        }
    }

    pub fn register_transform<T: TransformPass + 'static>(
        &mut self,
        name: impl Into<String>,
        pass: T,
        deps: Vec<Box<dyn TransformPass>>,
    ) {
        let name = name.into();
        self.transforms.insert(name.clone(), Box::new(pass));
        self.deps.insert(name, deps);
    }

    /// Run a registered transform (and its dependencies) until it reports no
    /// change, up to `max_iter` iterations.
    ///
    /// # Returns
    ///
    /// The number of iterations actually run.
    pub fn run_transform(
        &mut self,
        name: impl Into<String>,
        g: &mut Graph,
        max_iter: usize,
    ) -> usize {
        let mut iter = 0;
        let name = name.into();
        for _ in 0..max_iter {
            iter += 1;
            let mut changed = false;
            for pass in self.deps.get_mut(&name).unwrap() {
                pass.fetch_params(&self.parameters);
                let (_, local_changed) = GraphPassMut::run(pass.as_mut(), g).unwrap();
                changed |= local_changed;
            }
            let transform = self.transforms.get_mut(&name).unwrap();
            transform.fetch_params(&self.parameters);
            let (_, local_changed) = GraphPassMut::run(transform.as_mut(), g).unwrap();
            changed |= local_changed;
            if !changed {
                break;
            }
        }
        iter
    }
}
