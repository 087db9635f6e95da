use super::{AuthscanOrchestrator, ComponentState};
use std::collections::HashMap;
use tracing::debug;

impl AuthscanOrchestrator {
    /// Update component state
    pub fn set_component_state(&self, component: &str, state: ComponentState) {
        let mut states = self.component_states.lock();
        states.insert(component.to_string(), state.clone());
        debug!("Component '{}' state changed to: {:?}", component, state);
    }

    /// Get component state
    pub fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().get(component).cloned()
    }

    /// Get all component states
    pub fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        self.component_states.lock().clone()
    }
}
