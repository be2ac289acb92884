pub mod cli;
pub mod gtfs;
pub mod patterns;
pub mod run;
pub mod store;
pub mod writer;

#[cfg(test)]
mod test_utils;

/// An error and all its causes, joined by `: `.
pub fn error_chain(e: &dyn std::error::Error) -> String {
    let mut messages = vec![e.to_string()];
    let mut current = e.source();
    while let Some(cause) = current {
        messages.push(cause.to_string());
        current = cause.source();
    }
    messages.join(": ")
}
