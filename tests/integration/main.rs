//! Integration tests: the HTTP proof client against a mock attestation
//! service, and the scheduler and timer loops under paused time.

mod mock_attestor;
mod proof_client;
mod scheduler;
