use super::assertions::Assertion;

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Work tree changes
    WriteFile {
        path: String,
        content: Vec<u8>,
    },
    RemoveFile {
        path: String,
    },
    RenameFile {
        from: String,
        to: String,
    },
    Commit {
        label: String,
        message: String,
    },
    Branch {
        name: String,
    },
    Checkout {
        name: String,
    },
    Merge {
        label: String,
        branch: String,
    },
    Tag {
        name: String,
        message: Option<String>,
    },

    // Loading
    Load {
        range: Vec<String>,
    },
    LoadFileHistory {
        path: String,
    },
    LoadAndCancel,

    // Assertions (can be interspersed)
    Assert {
        assertion: Assertion,
    },
}
