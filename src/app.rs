//! The state-machine application SPI (spec.md §6), grounded on the
//! teacher's `App::execute` (`app.rs`).

pub trait Application: Send + Sync {
    /// Deterministic, synchronous; invoked exactly once per retired
    /// request (spec.md §6).
    fn execute(&mut self, operation: &[u8]) -> Vec<u8>;
}

/// An application that performs no work, for tests and for the Non-goal
/// configurations that don't yet have a state machine wired up.
#[derive(Debug, Default)]
pub struct NullApplication;

impl Application for NullApplication {
    fn execute(&mut self, _operation: &[u8]) -> Vec<u8> {
        Vec::new()
    }
}

/// Echoes the operation back as the result, useful for asserting
/// exactly-once execution in tests.
#[derive(Debug, Default)]
pub struct EchoApplication {
    pub executions: Vec<Vec<u8>>,
}

impl Application for EchoApplication {
    fn execute(&mut self, operation: &[u8]) -> Vec<u8> {
        self.executions.push(operation.to_vec());
        operation.to_vec()
    }
}
