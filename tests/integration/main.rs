mod cli_test;
mod common;
mod farm_test;
