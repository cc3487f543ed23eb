mod fetcher_test;
mod loader_test;
mod runner_test;
mod schema_test;
