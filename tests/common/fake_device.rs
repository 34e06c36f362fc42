use std::time::Duration;

use screen_script::device::{Device, DeviceAction, DeviceError, DeviceSnapshot};
use screen_script::tree::NodeRecord;

type Transition = Box<dyn FnMut(&DeviceAction, usize) -> usize>;

/// Scripted device: a list of screens and a transition function picking the
/// next screen after every action. Records every action it receives.
pub struct FakeDevice {
    pub screens: Vec<DeviceSnapshot>,
    pub current: usize,
    pub actions: Vec<DeviceAction>,
    pub snapshots_taken: usize,
    transition: Transition,
}

impl FakeDevice {
    /// A screen that never changes.
    pub fn fixed(views: Vec<NodeRecord>) -> Self {
        Self::with_transitions(vec![views], |_, current| current)
    }

    /// Every action advances to the next screen, staying on the last one.
    pub fn sequence(screens: Vec<Vec<NodeRecord>>) -> Self {
        let last = screens.len().saturating_sub(1);
        Self::with_transitions(screens, move |_, current| (current + 1).min(last))
    }

    pub fn with_transitions(
        screens: Vec<Vec<NodeRecord>>,
        transition: impl FnMut(&DeviceAction, usize) -> usize + 'static,
    ) -> Self {
        Self {
            screens: screens.into_iter().map(DeviceSnapshot::new).collect(),
            current: 0,
            actions: Vec::new(),
            snapshots_taken: 0,
            transition: Box::new(transition),
        }
    }

    pub fn action_names(&self) -> Vec<&'static str> {
        self.actions.iter().map(DeviceAction::name).collect()
    }
}

impl Device for FakeDevice {
    fn snapshot(&mut self) -> Result<DeviceSnapshot, DeviceError> {
        self.snapshots_taken += 1;
        self.screens
            .get(self.current)
            .cloned()
            .ok_or_else(|| DeviceError::Other(format!("no screen {}", self.current)))
    }

    fn perform(&mut self, action: &DeviceAction) -> Result<(), DeviceError> {
        self.actions.push(action.clone());
        self.current = (self.transition)(action, self.current);
        Ok(())
    }

    fn settle(&mut self, _interval: Duration) {}
}
