mod common;
mod conflict;
