pub mod clear;
pub mod run;
