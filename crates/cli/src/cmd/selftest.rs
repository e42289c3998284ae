//! Implementation of `conda-bundle --test`.

use anyhow::{Result, bail};

use condabundle_lib::platform::os::Os;
use condabundle_lib::selftest::{self, CheckStatus};

use crate::output::{Mark, print_rows, status};

pub fn cmd_selftest() -> Result<()> {
  let report = selftest::run(Os::current());

  for check in &report.checks {
    let mark = match check.status {
      CheckStatus::Pass => Mark::Done,
      CheckStatus::Warn => Mark::Warn,
      CheckStatus::Fail => Mark::Fail,
    };
    match &check.details {
      Some(details) => println!("{} {}: {details}", mark.colored(), check.name),
      None => println!("{} {}", mark.colored(), check.name),
    }
  }

  println!();
  print_rows(&[
    ("passed", report.count(CheckStatus::Pass).to_string()),
    ("warnings", report.count(CheckStatus::Warn).to_string()),
    ("failed", report.count(CheckStatus::Fail).to_string()),
  ]);

  if !report.all_passed() {
    status(Mark::Fail, "Self test failed");
    bail!("{} check(s) failed", report.count(CheckStatus::Fail));
  }
  if report.count(CheckStatus::Warn) > 0 {
    status(Mark::Warn, "Some optional tools are missing");
  }
  status(Mark::Done, "Self test passed");
  Ok(())
}
