#[cfg(test)]
pub(crate) mod fake;
