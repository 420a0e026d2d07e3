pub(crate) mod frontend;

pub(crate) const DEFAULT_PORT: &str = "9600";
