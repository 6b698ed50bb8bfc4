//! Integration tests for daily-pricing

mod adjustments_test;
mod e2e_test;
mod store_test;
