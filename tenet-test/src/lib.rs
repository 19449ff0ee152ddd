// Integration test utilities and fixture projects for Tenet.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tenet_core::convention::NamingConvention;
use tenet_core::learn::CancellationHandle;
use tenet_core::service::TenetService;
use tenet_core::store::PatternStore;
use tenet_core::types::{
    Language, LearningDelta, Pattern, PatternForm, PatternId, PatternSubject, pattern_signature,
};

/// A temporary project directory with its own registry location.
#[derive(Debug)]
pub struct TestProject {
    pub dir: tempfile::TempDir,
    registry: PathBuf,
    home: Arc<tempfile::TempDir>,
}

impl TestProject {
    /// An empty project with a private registry.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("create tempdir");
        let home = Arc::new(tempfile::tempdir().expect("create registry dir"));
        Self {
            registry: home.path().join("registry.db"),
            dir,
            home,
        }
    }

    /// An Express-style TypeScript service layer: camelCase names, services
    /// under `src/services/`, imports ordered builtin → external → relative,
    /// and logged `catch` blocks.
    pub fn express_service() -> Self {
        let project = Self::empty();
        for entity in ["user", "order", "invoice", "payment", "account", "session"] {
            let title = capitalize(entity);
            project.write(
                &format!("src/services/{entity}.service.ts"),
                &format!(
                    "import fs from 'fs';
import express from 'express';
import {{ db }} from './db';

export async function load{title}(id) {{
  try {{
    const {entity}Record = await db.find(id);
    return {entity}Record;
  }} catch (err) {{
    logger.error(err);
    throw err;
  }}
}}
"
                ),
            );
        }
        project
    }

    /// A small Python package with snake_case functions and PascalCase
    /// classes.
    pub fn python_package() -> Self {
        let project = Self::empty();
        for module in ["users", "orders", "billing", "reports", "search"] {
            let class = capitalize(module);
            project.write(
                &format!("pkg/{module}.py"),
                &format!(
                    "import os\n\nclass {class}Repository:\n    pass\n\ndef load_{module}(path):\n    return os.path.join(path, '{module}')\n"
                ),
            );
        }
        project
    }

    /// Use `other`'s registry so both projects can be linked together.
    #[must_use]
    pub fn sharing_registry(mut self, other: &TestProject) -> Self {
        self.registry.clone_from(&other.registry);
        self.home = Arc::clone(&other.home);
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn registry_path(&self) -> &Path {
        &self.registry
    }

    pub fn write(&self, relative: &str, content: &str) {
        let full = self.path().join(relative);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(full, content).expect("write fixture file");
    }

    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.path().join(relative)).expect("remove fixture file");
    }

    pub fn rename(&self, from: &str, to: &str) {
        let target = self.path().join(to);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::rename(self.path().join(from), target).expect("rename fixture file");
    }

    /// Initialize `.tenet/` and open the service.
    pub fn init(&self) -> TenetService {
        TenetService::init(self.path(), &self.registry).expect("init tenet project")
    }

    /// Initialize and run a full learn.
    pub async fn learned(&self) -> (TenetService, LearningDelta) {
        let service = self.init();
        let delta = service
            .learn_project(&CancellationHandle::new())
            .await
            .expect("learn project");
        (service, delta)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// A pattern with explicit statistics, for seeding a store directly.
pub fn seeded_pattern(
    subject: PatternSubject,
    qualifier: Option<&str>,
    form: PatternForm,
    language: Language,
    confidence: f64,
    frequency: u64,
) -> Pattern {
    let now = Utc::now();
    Pattern {
        id: PatternId(0),
        category: subject.category(),
        subject,
        signature: pattern_signature(subject, qualifier, language),
        expected_form: form,
        confidence,
        frequency,
        language,
        examples: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

/// Seed a TypeScript variable-naming pattern.
pub async fn seed_variable_naming(
    store: &dyn PatternStore,
    convention: NamingConvention,
    confidence: f64,
    frequency: u64,
) -> PatternId {
    store
        .put_pattern(&seeded_pattern(
            PatternSubject::VariableNaming,
            None,
            PatternForm::Naming { convention },
            Language::TypeScript,
            confidence,
            frequency,
        ))
        .await
        .expect("seed pattern")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("user"), "User");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn express_fixture_has_services() {
        let project = TestProject::express_service();
        assert!(project.path().join("src/services/user.service.ts").exists());
        assert!(project.path().join("src/services/session.service.ts").exists());
    }
}
