#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub(crate) name: String,
}

impl User {
    pub fn name(&self) -> &str {
        &self.name
    }
}
