use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::errors::RvsError;

impl Repository {
    /// Branch-only front end to checkout: existing branches only, no
    /// detaching.
    pub fn switch(&self, name: &str) -> anyhow::Result<()> {
        let branch = BranchName::try_parse(name.to_string())
            .map_err(|_| RvsError::Usage(format!("invalid reference: {}", name)))?;

        if !self.refs().branch_exists(&branch) {
            anyhow::bail!(RvsError::Usage(format!("invalid reference: {}", name)));
        }

        self.checkout_branch(&branch, false)
    }

    /// `switch -c <name>`: create the branch from HEAD and switch to
    /// it.
    pub fn switch_create(&self, name: &str) -> anyhow::Result<()> {
        self.checkout_new_branch(name, None, false)
    }
}
