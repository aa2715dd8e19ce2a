//! Build script support.
//!
//! Call [`process_root`] from a `build.rs` to regenerate the parser for
//! every `*.y` grammar under the crate root into `OUT_DIR`.

use crate::codegen::Codegen;
use crate::grammar::Grammar;
use anyhow::Context as _;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

pub fn process_root() -> anyhow::Result<()> {
    let build = Build::new()?;
    build.process()
}

pub fn process_dir(root_dir: &Path) -> anyhow::Result<()> {
    let build = Build::with_root_dir(root_dir.to_owned())?;
    build.process()
}

#[derive(Debug)]
pub struct Build {
    root_dir: PathBuf,
    out_dir: PathBuf,
}

impl Build {
    pub fn new() -> anyhow::Result<Self> {
        let root_dir = env::var_os("CARGO_MANIFEST_DIR")
            .map(PathBuf::from)
            .context("The environment variable `CARGO_MANIFEST_DIR' is not set")?;
        Self::with_root_dir(root_dir)
    }

    pub fn with_root_dir(root_dir: PathBuf) -> anyhow::Result<Self> {
        let out_dir = env::var_os("OUT_DIR")
            .map(PathBuf::from)
            .context("The environment variable `OUT_DIR' is not set")?;
        Ok(Self { root_dir, out_dir })
    }

    pub fn process(&self) -> anyhow::Result<()> {
        for entry in WalkDir::new(&self.root_dir) {
            let entry = entry.context("from WalkDir entry")?;
            if !entry.file_type().is_file() {
                continue;
            }
            let in_file = entry.path();
            match in_file.extension().and_then(|ext| ext.to_str()) {
                Some("y") => self.process_file(in_file)?,
                _ => continue,
            }
        }
        Ok(())
    }

    fn process_file(&self, in_file: &Path) -> anyhow::Result<()> {
        let mut out_file = self.out_dir.join(in_file.strip_prefix(&self.root_dir)?);
        out_file.set_extension("rs");
        if let Some(out_dir) = out_file.parent() {
            fs::create_dir_all(out_dir)?;
        }

        println!("cargo:rerun-if-changed={}", in_file.display());

        let text = fs::read_to_string(in_file)
            .with_context(|| format!("failed to read {}", in_file.display()))?;
        let text = crate::preprocess::preprocess(&text, &Default::default())?;

        let mut grammar = Grammar::new(in_file.display().to_string());
        crate::syntax::parse(&mut grammar, &text);
        anyhow::ensure!(
            grammar.error_count == 0,
            "{} error(s) while parsing {}",
            grammar.error_count,
            in_file.display()
        );

        let (_automaton, tables) = crate::compute(&mut grammar, Default::default())
            .context("failed to construct the parse tables")?;
        if grammar.conflict_count > 0 {
            println!(
                "cargo:warning={} parsing conflict(s) in {}",
                grammar.conflict_count,
                in_file.display()
            );
        }

        let codegen = Codegen::new(&grammar, &tables);
        fs::write(&out_file, codegen.to_string())?;
        Ok(())
    }
}
