//! Per-language execution profiles

use crate::{types::Language, Result};

/// Static description of how one language is run inside a container
#[derive(Debug, PartialEq, Eq)]
pub struct ExecutionProfile {
    pub language: Language,
    /// Image reference, pulled on first use
    pub image: &'static str,
    /// Command prefix; the in-container source filename is appended to it.
    /// Shell scripts receive that filename as `$0`, and must write build
    /// output under `/tmp` because the source mount is read-only.
    pub command: &'static [&'static str],
    /// Filename the source is mounted as inside the working directory
    pub source_file: &'static str,
    /// Extension used for the staged host file
    pub extension: &'static str,
}

impl ExecutionProfile {
    /// Full container command for this profile
    pub fn container_command(&self) -> Vec<String> {
        self.command
            .iter()
            .copied()
            .chain(std::iter::once(self.source_file))
            .map(str::to_string)
            .collect()
    }
}

static JAVASCRIPT: ExecutionProfile = ExecutionProfile {
    language: Language::JavaScript,
    image: "node:18-alpine",
    command: &["node"],
    source_file: "index.js",
    extension: "js",
};

static TYPESCRIPT: ExecutionProfile = ExecutionProfile {
    language: Language::TypeScript,
    image: "node:22-alpine",
    command: &["node", "--experimental-strip-types", "--no-warnings"],
    source_file: "index.ts",
    extension: "ts",
};

static PYTHON: ExecutionProfile = ExecutionProfile {
    language: Language::Python,
    image: "python:3.11-alpine",
    command: &["python"],
    source_file: "main.py",
    extension: "py",
};

static JAVA: ExecutionProfile = ExecutionProfile {
    language: Language::Java,
    image: "eclipse-temurin:17-jdk-alpine",
    command: &["sh", "-c", r#"javac -d /tmp "$0" && java -cp /tmp Main"#],
    source_file: "Main.java",
    extension: "java",
};

static GO: ExecutionProfile = ExecutionProfile {
    language: Language::Go,
    image: "golang:1.21-alpine",
    command: &["go", "run"],
    source_file: "main.go",
    extension: "go",
};

static RUST: ExecutionProfile = ExecutionProfile {
    language: Language::Rust,
    image: "rust:1.75-alpine",
    command: &["sh", "-c", r#"rustc -o /tmp/main "$0" && /tmp/main"#],
    source_file: "main.rs",
    extension: "rs",
};

static CPP: ExecutionProfile = ExecutionProfile {
    language: Language::Cpp,
    image: "gcc:12",
    command: &["sh", "-c", r#"g++ -o /tmp/main "$0" && /tmp/main"#],
    source_file: "main.cpp",
    extension: "cpp",
};

impl Language {
    pub fn profile(self) -> &'static ExecutionProfile {
        match self {
            Language::JavaScript => &JAVASCRIPT,
            Language::TypeScript => &TYPESCRIPT,
            Language::Python => &PYTHON,
            Language::Java => &JAVA,
            Language::Go => &GO,
            Language::Rust => &RUST,
            Language::Cpp => &CPP,
        }
    }
}

/// Resolve a language identifier to its execution profile
pub fn lookup(language_id: &str) -> Result<&'static ExecutionProfile> {
    let language: Language = language_id.parse()?;
    Ok(language.profile())
}
