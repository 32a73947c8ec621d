use fail::FailScenario;

/// Turns failpoints on for the lifetime of the value.
///
/// Scenarios are serialized process-wide, and every configured failpoint is switched off
/// again on drop.
pub struct FailpointScenario<'a> {
    _scenario: FailScenario<'a>,
    names: Vec<String>,
}

impl<'a> FailpointScenario<'a> {
    /// Configures each `(name, action)` pair, e.g. `("reconcile.before_emit", "return(emit)")`.
    pub fn setup(failpoints: &[(&str, &str)]) -> FailpointScenario<'a> {
        let scenario = FailScenario::setup();
        for (name, action) in failpoints {
            fail::cfg(*name, action).unwrap();
        }

        Self {
            _scenario: scenario,
            names: failpoints.iter().map(|(name, _)| name.to_string()).collect(),
        }
    }

    /// Switches one failpoint off before the scenario ends.
    pub fn disable(&self, name: &str) {
        fail::remove(name);
    }
}

impl Drop for FailpointScenario<'_> {
    fn drop(&mut self) {
        for name in &self.names {
            fail::remove(name);
        }
    }
}
