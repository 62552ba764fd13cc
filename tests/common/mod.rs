#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// A report export with two junk rows above the real header, day-first
/// dates, and one malformed date row.
pub const NOISY_REPORT: &str = "\
InterCast weekly balance snapshot,,,,,\n\
extracted 05/04/2025 by planning,,,,,\n\
SO Description,Factory,KT,PPC Delivery Period,Due Date,Total Bag Bal\n\
LGD solitaire ring,North,KT_old,Due,15/01/2025,4\n\
Classic mined band,North,KT_14,Overdue,20/02/2025,6\n\
LGD eternity band,South,KT_old,Due,25/03/2025,8\n\
LGD halo pendant,South,KT_09,2 Weeks,28/01/2025,2\n\
LGD cluster ring,North,KT_14,5 Weeks,14/02/2025,7\n\
Classic mined hoop,South,KT_09,Due,31/03/2025,not-a-number\n\
LGD signet,North,KT_14,Due,bad-date,5\n";
