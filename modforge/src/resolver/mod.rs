//! Manifest resolution.
//!
//! Binds each manifest key to at most one catalog record and classifies the
//! result into a [`ModKind`]. Binding runs two passes over the manifest in
//! order:
//!
//! 1. strict: the record's raw `title + author` is a substring of the key
//! 2. loose: the record's title alone is a substring of the key
//!
//! A bound record leaves the pool, so each record serves at most one key.
//! Separators and hardcoded exceptions never consume a record.
//!
//! Both passes bind the first qualifying record in catalog order. When one
//! title is a substring of another the loose pass can bind the wrong record;
//! this is pinned by `test_loose_pass_binds_first_title_substring`.

mod descriptor;
pub mod exceptions;

pub use descriptor::{classify, is_separator_key, ModDescriptor, ModKind, GALLERY_PLACEHOLDER};

use crate::catalog::{CatalogRecord, Catalogs};
use crate::report::Diagnostic;

/// Ordered descriptors plus the diagnostics produced while resolving.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Descriptors in manifest order, exceptions missing from the manifest
    /// appended last.
    pub descriptors: Vec<ModDescriptor>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Several install targets served by one repository fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitResourceGroup {
    pub repository: String,
    pub targets: Vec<ModDescriptor>,
}

impl Resolution {
    pub fn get(&self, name: &str) -> Option<&ModDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Descriptors of the given kind, in order.
    pub fn of_kind(&self, kind: ModKind) -> impl Iterator<Item = &ModDescriptor> {
        self.descriptors.iter().filter(move |d| d.kind == kind)
    }

    /// Group repository-backed descriptors by repository, in order of first
    /// appearance.
    pub fn git_groups(&self) -> Vec<GitResourceGroup> {
        let mut groups: Vec<GitResourceGroup> = Vec::new();

        for descriptor in self.of_kind(ModKind::GitResource) {
            let Some(repository) = descriptor.repository.as_deref() else {
                continue;
            };

            match groups.iter_mut().find(|g| g.repository == repository) {
                Some(group) => group.targets.push(descriptor.clone()),
                None => groups.push(GitResourceGroup {
                    repository: repository.to_string(),
                    targets: vec![descriptor.clone()],
                }),
            }
        }

        groups
    }
}

/// Resolve the manifest against the catalog.
pub fn resolve(catalogs: &Catalogs) -> Resolution {
    let manifest = &catalogs.manifest;
    let mut pool: Vec<&CatalogRecord> = catalogs.records.iter().collect();
    let mut bound: Vec<Option<&CatalogRecord>> = vec![None; manifest.len()];

    let eligible: Vec<bool> = manifest
        .iter()
        .map(|l| !is_separator_key(&l.name) && exceptions::find(&l.name).is_none())
        .collect();

    bind_pass(&manifest_keys(catalogs), &eligible, &mut pool, &mut bound, |r| {
        r.match_key.as_str()
    });
    bind_pass(&manifest_keys(catalogs), &eligible, &mut pool, &mut bound, |r| {
        r.title.as_str()
    });

    let mut diagnostics: Vec<Diagnostic> = catalogs
        .parse_errors
        .iter()
        .cloned()
        .map(Diagnostic::SkippedLine)
        .collect();

    for record in &pool {
        diagnostics.push(Diagnostic::UnboundRecord {
            name: record.match_key.clone(),
        });
    }

    let mut descriptors = Vec::with_capacity(manifest.len());
    for (line, record) in manifest.iter().zip(&bound) {
        if is_separator_key(&line.name) {
            descriptors.push(ModDescriptor::separator(&line.name, line.enabled));
        } else if let Some(exception) = exceptions::find(&line.name) {
            descriptors.push(exception.descriptor(line.enabled));
        } else if let Some(record) = record {
            descriptors.push(ModDescriptor::from_record(&line.name, line.enabled, record));
        } else {
            diagnostics.push(Diagnostic::UnmatchedEntry {
                name: line.name.clone(),
            });
        }
    }

    for exception in exceptions::EXCEPTIONS {
        let name = exception.name();
        if !manifest.iter().any(|l| l.name == name) {
            descriptors.push(exception.descriptor(true));
        }
    }

    for diagnostic in &diagnostics {
        tracing::warn!("{}", diagnostic);
    }
    tracing::info!(
        descriptors = descriptors.len(),
        diagnostics = diagnostics.len(),
        "Resolved manifest"
    );

    Resolution {
        descriptors,
        diagnostics,
    }
}

fn manifest_keys(catalogs: &Catalogs) -> Vec<&str> {
    catalogs.manifest.iter().map(|l| l.name.as_str()).collect()
}

/// Bind every unbound eligible key to the first pooled record whose needle is
/// a substring of it. Records with an empty needle never bind.
fn bind_pass<'a>(
    keys: &[&str],
    eligible: &[bool],
    pool: &mut Vec<&'a CatalogRecord>,
    bound: &mut [Option<&'a CatalogRecord>],
    needle: impl Fn(&CatalogRecord) -> &str,
) {
    for (idx, key) in keys.iter().enumerate() {
        if !eligible[idx] || bound[idx].is_some() {
            continue;
        }

        let found = pool.iter().position(|r| {
            let n = needle(r);
            !n.is_empty() && key.contains(n)
        });

        if let Some(pos) = found {
            bound[idx] = Some(pool.remove(pos));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const STASH_LINE: &str = "https://www.moddb.com/addons/start/200140\t0\t- Grokitach\tStash Overhaul \thttps://www.moddb.com/mods/stalker-anomaly/addons/groks-stash-overhaul-redux";

    fn resolve_text(manifest: &str, catalog: &str) -> Resolution {
        resolve(&Catalogs::parse(manifest, catalog))
    }

    fn catalog_names(resolution: &Resolution) -> Vec<&str> {
        resolution
            .descriptors
            .iter()
            .filter(|d| exceptions::find(&d.name).is_none())
            .map(|d| d.name.as_str())
            .collect()
    }

    #[test]
    fn test_strict_pass_binds_title_and_author() {
        let r = resolve_text("+60- Stash Overhaul - Grokitach\n", STASH_LINE);
        let d = r.get("60- Stash Overhaul - Grokitach").unwrap();

        assert_eq!(d.author, "Grokitach");
        assert_eq!(d.title, "Stash Overhaul");
        assert_eq!(d.kind, ModKind::GalleryHosted);
        assert!(!r
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::UnboundRecord { .. })));
    }

    #[test]
    fn test_loose_pass_binds_title_only() {
        let r = resolve_text("+60- Stash Overhaul\n", STASH_LINE);
        let d = r.get("60- Stash Overhaul").unwrap();
        assert_eq!(d.title, "Stash Overhaul");
    }

    #[test]
    fn test_strict_pass_runs_before_loose() {
        // The first key would loosely match the first record, but the strict
        // pass gives that record to the second key.
        let manifest = "+1- Armor - Other\n+2- Armor - Bob\n";
        let catalog = "http://x/bob.zip\t0\t- Bob\tArmor \n\
                       http://x/other.zip\t0\t- Carl\tArmor \n";
        let r = resolve_text(manifest, catalog);

        assert_eq!(r.get("2- Armor - Bob").unwrap().content_url, "http://x/bob.zip");
        assert_eq!(
            r.get("1- Armor - Other").unwrap().content_url,
            "http://x/other.zip"
        );
    }

    #[test]
    fn test_loose_pass_binds_first_title_substring() {
        let manifest = "+1- Weapon Pack Extended\n+2- Weapon Pack\n";
        let catalog = "http://x/base.zip\t0\t- A\tWeapon Pack\n\
                       http://x/ext.zip\t0\t- B\tWeapon Pack Extended\n";
        let r = resolve_text(manifest, catalog);

        // Mis-bind: the shorter title is a substring of the longer key.
        assert_eq!(
            r.get("1- Weapon Pack Extended").unwrap().content_url,
            "http://x/base.zip"
        );
        assert!(r.get("2- Weapon Pack").is_none());
        assert!(r.diagnostics.contains(&Diagnostic::UnboundRecord {
            name: "Weapon Pack Extended- B".to_string()
        }));
        assert!(r.diagnostics.contains(&Diagnostic::UnmatchedEntry {
            name: "2- Weapon Pack".to_string()
        }));
    }

    #[test]
    fn test_separators_never_consume_records() {
        let manifest = "+Stash Overhaul_separator\n+60- Stash Overhaul - Grokitach\n";
        let r = resolve_text(manifest, STASH_LINE);

        assert_eq!(r.descriptors[0].kind, ModKind::Separator);
        assert!(r.descriptors[0].content_url.is_empty());
        assert_eq!(r.descriptors[1].kind, ModKind::GalleryHosted);
    }

    #[test]
    fn test_unbound_record_reported() {
        let r = resolve_text("+something else\n", STASH_LINE);
        assert!(r.diagnostics.contains(&Diagnostic::UnboundRecord {
            name: "Stash Overhaul - Grokitach".to_string()
        }));
        assert!(catalog_names(&r).is_empty());
    }

    #[test]
    fn test_three_field_line_not_resolved() {
        let manifest = "+1- Broken - Me\n+2- Fine - Me\n";
        let catalog = "http://x/broken.zip\t0\t- Me\n\
                       http://x/fine.zip\t0\t- Me\tFine \n";
        let r = resolve_text(manifest, catalog);

        assert_eq!(catalog_names(&r), vec!["2- Fine - Me"]);
        assert!(matches!(r.diagnostics[0], Diagnostic::SkippedLine(_)));
    }

    #[test]
    fn test_order_and_flags_preserved() {
        let manifest = "+c - Me\n-a - Me\n+b - Me\n";
        let catalog = "http://x/a.zip\t0\t- Me\ta \n\
                       http://x/b.zip\t0\t- Me\tb \n\
                       http://x/c.zip\t0\t- Me\tc \n";
        let r = resolve_text(manifest, catalog);

        assert_eq!(catalog_names(&r), vec!["c - Me", "a - Me", "b - Me"]);
        assert!(!r.get("a - Me").unwrap().enabled);
    }

    #[test]
    fn test_exceptions_appended_and_not_overridden() {
        let name = exceptions::EXCEPTIONS[0].name();
        let manifest = format!("+{name}\n");
        // A catalog record that would otherwise match the exception key.
        let catalog = "http://x/fake.zip\t0\t- Grokitach\tLarge Files Textures \n";
        let r = resolve_text(&manifest, catalog);

        let d = r.get(&name).unwrap();
        assert_eq!(d.repository.as_deref(), Some(exceptions::LARGE_FILES_REPOSITORY));
        assert_eq!(r.descriptors[0].name, name);

        // Entries absent from the manifest follow the manifest entries.
        let others: Vec<&str> = r.descriptors[1..].iter().map(|d| d.name.as_str()).collect();
        assert_eq!(others.len(), exceptions::EXCEPTIONS.len() - 1);
    }

    #[test]
    fn test_git_groups_share_repository() {
        let manifest = "+1- Tex A - Me\n+2- Plain - Me\n+3- Tex B - Me\n";
        let catalog = "https://www.moddb.com/addons/start/222467\t0\t- Me\tTex A \thttps://github.com/me/assets\n\
                       http://x/plain.zip\t0\t- Me\tPlain \n\
                       https://github.com/me/assets\t0\t- Me\tTex B \n";
        let r = resolve_text(manifest, catalog);
        let groups = r.git_groups();

        let assets = groups
            .iter()
            .find(|g| g.repository == "https://github.com/me/assets")
            .unwrap();
        let targets: Vec<&str> = assets.targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(targets, vec!["1- Tex A - Me", "3- Tex B - Me"]);
        assert!(groups
            .iter()
            .any(|g| g.repository == exceptions::LARGE_FILES_REPOSITORY));
    }

    fn catalog_line() -> impl Strategy<Value = String> {
        (
            prop::sample::select(vec![
                "http://x/a.zip",
                "https://www.moddb.com/addons/start/1",
                "https://github.com/u/p",
            ]),
            "[ab ]{0,3}",
            "[abc ]{0,4}",
        )
            .prop_map(|(url, author, title)| format!("{url}\t0\t{author}\t{title}"))
    }

    proptest! {
        #[test]
        fn prop_resolve_is_idempotent(
            manifest in prop::collection::vec("[+-][abc _]{0,8}(separator)?", 0..8),
            catalog in prop::collection::vec(catalog_line(), 0..8),
        ) {
            let catalogs = Catalogs::parse(&manifest.join("\n"), &catalog.join("\n"));
            let first = resolve(&catalogs);
            let second = resolve(&catalogs);
            prop_assert_eq!(&first, &second);

            // Names stay unique.
            let mut names: Vec<&str> = first.descriptors.iter().map(|d| d.name.as_str()).collect();
            let total = names.len();
            names.sort_unstable();
            names.dedup();
            prop_assert_eq!(names.len(), total);
        }
    }
}
