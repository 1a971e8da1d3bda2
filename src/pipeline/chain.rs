use crate::core::batch::PacketBatch;
use crate::error::{PipelineError, Result};
use crate::pipeline::stage::{Stage, Transfer};
use bytes::{Bytes, BytesMut};

struct NamedStage {
    name: String,
    stage: Box<dyn Stage>,
}

/// An ordered, uniquely named sequence of transformation stages.
///
/// Stages execute inbound in chain order and outbound in reverse chain
/// order. Mutation is addressed by name; the chain never hands out owned
/// stages except through [`remove`](StageChain::remove).
///
/// The chain is exclusively mutated by the single execution context that
/// owns the session; it is not synchronized.
#[derive(Default)]
pub struct StageChain {
    stages: Vec<NamedStage>,
}

impl StageChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }

    /// Append a stage at the tail of the chain
    ///
    /// # Errors
    /// Returns `PipelineError::StageExists` if the name is taken.
    pub fn push(&mut self, name: &str, stage: Box<dyn Stage>) -> Result<()> {
        if self.contains(name) {
            return Err(PipelineError::StageExists(name.to_string()));
        }
        self.stages.push(NamedStage {
            name: name.to_string(),
            stage,
        });
        Ok(())
    }

    /// Insert a stage immediately after the named anchor
    ///
    /// # Errors
    /// Returns `PipelineError::StageExists` if the name is taken, or
    /// `PipelineError::StageMissing` if the anchor is not in the chain.
    pub fn insert_after(&mut self, anchor: &str, name: &str, stage: Box<dyn Stage>) -> Result<()> {
        if self.contains(name) {
            return Err(PipelineError::StageExists(name.to_string()));
        }
        let index = self
            .position(anchor)
            .ok_or_else(|| PipelineError::StageMissing(anchor.to_string()))?;
        self.stages.insert(
            index + 1,
            NamedStage {
                name: name.to_string(),
                stage,
            },
        );
        Ok(())
    }

    /// Remove and return the named stage, if present
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Stage>> {
        let index = self.position(name)?;
        Some(self.stages.remove(index).stage)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Stage> {
        self.stages
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.stage.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Stage + 'static)> {
        self.stages
            .iter_mut()
            .find(|s| s.name == name)
            .map(|s| s.stage.as_mut())
    }

    /// Typed view of a stage, for in-place reconfiguration
    pub fn get_as<T: Stage + 'static>(&self, name: &str) -> Option<&T> {
        self.get(name)?.as_any().downcast_ref()
    }

    /// Typed mutable view of a stage
    pub fn get_as_mut<T: Stage + 'static>(&mut self, name: &str) -> Option<&mut T> {
        self.get_mut(name)?.as_any_mut().downcast_mut()
    }

    /// Stage names in execution (inbound) order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run the inbound direction: wire bytes in, decoded batch out
    pub fn decode(&mut self, wire: BytesMut) -> Result<PacketBatch> {
        let mut transfer = Transfer::inbound(wire);
        for entry in &mut self.stages {
            entry.stage.decode(&mut transfer)?;
        }
        Ok(transfer.batch)
    }

    /// Run the outbound direction: batch in, wire bytes out
    pub fn encode(&mut self, batch: PacketBatch) -> Result<Bytes> {
        let mut transfer = Transfer::outbound(batch);
        for entry in self.stages.iter_mut().rev() {
            entry.stage.encode(&mut transfer)?;
        }
        Ok(transfer.wire.freeze())
    }
}
