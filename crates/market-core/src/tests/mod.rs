//! Scenario tests spanning coordinator, agents and the failure detector

mod concurrency_test;
