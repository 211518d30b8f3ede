
pub mod test_calls;
pub mod test_closures;
pub mod test_coroutine;
