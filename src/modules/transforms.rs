use super::keys;
use crate::core::Namespace;
use crate::descriptor::TaskSpec;
use crate::error::ModuleResult;
use crate::registry::Module;

/// Leaves the luminosities unchanged.
#[derive(Debug, Clone, Default)]
pub struct Identity;

impl Identity {
    pub fn new(_: &TaskSpec) -> ModuleResult<Self> {
        Ok(Self)
    }
}

impl Module for Identity {
    fn process(&self, inputs: &Namespace) -> ModuleResult<Namespace> {
        let mut out = Namespace::new();
        out.insert(keys::LUMINOSITIES, inputs.get(keys::LUMINOSITIES)?.clone());
        Ok(out)
    }
}
