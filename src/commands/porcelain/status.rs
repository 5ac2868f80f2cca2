use crate::areas::repository::Repository;
use crate::artifacts::status::report::StatusReport;

impl Repository {
    pub fn status(&self, short: bool) -> anyhow::Result<()> {
        let mut index = self.index_mut();
        index.rehydrate()?;

        let report = StatusReport::gather(self, &index)?;

        if short {
            report.print_short(&mut *self.writer())
        } else {
            report.print_long(&mut *self.writer())
        }
    }
}
