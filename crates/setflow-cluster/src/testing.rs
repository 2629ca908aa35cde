//! Scripted cluster used by unit tests

use crate::client::{ClusterClient, Route};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use setflow_core::ResourceType;
use std::collections::HashMap;
use std::sync::Mutex;

/// Serves scripted states for each resource, repeating the last one
#[derive(Default)]
pub struct ScriptedCluster {
    pub states: Mutex<HashMap<(ResourceType, String), Vec<Option<Value>>>>,
    pub rollout_in_progress: bool,
    pub rollouts: Mutex<Vec<String>>,
    pub project_calls: Mutex<Vec<String>>,
}

impl ScriptedCluster {
    pub fn script(self, restype: ResourceType, name: &str, states: Vec<Option<Value>>) -> Self {
        self.states
            .lock()
            .unwrap()
            .insert((restype, name.to_string()), states);
        self
    }
}

#[async_trait]
impl ClusterClient for ScriptedCluster {
    async fn apply(&self, _: &Value, _: &str) -> Result<()> {
        unimplemented!()
    }
    async fn get(&self, restype: ResourceType, name: &str) -> Result<Option<Value>> {
        let mut states = self.states.lock().unwrap();
        let Some(script) = states.get_mut(&(restype, name.to_string())) else {
            return Ok(None);
        };
        if script.len() > 1 {
            Ok(script.remove(0))
        } else {
            Ok(script.first().cloned().flatten())
        }
    }
    async fn get_from(&self, _: &str, _: ResourceType, _: &str) -> Result<Option<Value>> {
        unimplemented!()
    }
    async fn delete(&self, _: ResourceType, _: &str) -> Result<()> {
        unimplemented!()
    }
    async fn delete_all(&self, _: &str, _: Option<&str>) -> Result<()> {
        unimplemented!()
    }
    async fn start_build(&self, _: &str) -> Result<String> {
        unimplemented!()
    }
    async fn cancel_build(&self, _: &str) -> Result<()> {
        unimplemented!()
    }
    async fn tag_image(&self, _: &str, _: &str, _: bool) -> Result<()> {
        unimplemented!()
    }
    async fn import_image(&self, _: &str, _: Option<&str>, _: bool) -> Result<()> {
        unimplemented!()
    }
    async fn create_project(&self, name: &str) -> Result<()> {
        self.project_calls.lock().unwrap().push(format!("create {}", name));
        Ok(())
    }
    async fn switch_project(&self, name: &str) -> Result<()> {
        self.project_calls.lock().unwrap().push(format!("switch {}", name));
        Ok(())
    }
    async fn list_routes(&self) -> Result<Vec<Route>> {
        unimplemented!()
    }
    async fn link_secret(&self, _: &str, _: &str) -> Result<()> {
        unimplemented!()
    }
    async fn rollout_latest(&self, name: &str) -> Result<bool> {
        self.rollouts.lock().unwrap().push(name.to_string());
        Ok(!self.rollout_in_progress)
    }
}
