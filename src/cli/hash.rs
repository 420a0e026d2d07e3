use clap::Args;

use crate::core;
use crate::Result;

/// Print the hex SHA-256 of a password, as stored in credential files
#[derive(Args, Debug)]
pub struct HashCommand {
    /// Plaintext password
    password: String,
    /// Prefix the output with `<username>:` to form a credential file line
    #[arg(long, short = 'u')]
    username: Option<String>,
}

impl HashCommand {
    pub fn line(&self) -> String {
        let hash = core::hash(&self.password);
        match self.username {
            Some(ref username) => format!("{}:{}", username, hash),
            None => hash,
        }
    }

    pub async fn run(self) -> Result<()> {
        println!("{}", self.line());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Command, GuardianCommand};

    fn hash_command(args: &[&str]) -> HashCommand {
        let mut argv = vec!["guardian", "hash"];
        argv.extend_from_slice(args);
        let command = GuardianCommand::try_parse_from(argv).unwrap();
        match command.command {
            Command::Hash(hash) => hash,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn prints_hash() {
        assert_eq!(
            hash_command(&["bar"]).line(),
            "fcde2b2edba56bf408601fb721fe9b5c338d10ee429ea04fae5511b68fbf8fb9"
        );
    }

    #[test]
    fn prints_credential_line() {
        assert_eq!(
            hash_command(&["--username", "foo", "bar"]).line(),
            "foo:fcde2b2edba56bf408601fb721fe9b5c338d10ee429ea04fae5511b68fbf8fb9"
        );
    }
}
