//! Archive entry → filesystem target mapping

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Where an archive entry lands under the install directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTarget {
    pub folder: PathBuf,
    /// `None` for directory entries
    pub file: Option<PathBuf>,
}

/// Archive names may use either separator
pub fn normalize_entry_name(name: &str) -> String {
    name.replace('\\', "/")
}

/// Map a normalized entry name to its target under `install_dir`.
///
/// Returns `None` for names that would escape `install_dir` (absolute paths,
/// drive prefixes or `..` components).
pub fn resolve_target(install_dir: &Path, name: &str) -> Option<EntryTarget> {
    let is_dir = name.ends_with('/');
    let mut relative = PathBuf::new();

    for component in Path::new(name.trim_end_matches('/')).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if is_dir {
        return Some(EntryTarget {
            folder: install_dir.join(relative),
            file: None,
        });
    }

    let file = install_dir.join(&relative);
    let folder = match relative.parent() {
        Some(parent) => install_dir.join(parent),
        None => install_dir.to_path_buf(),
    };
    // "" or "." names have no file component
    if relative.file_name().is_none() {
        return None;
    }

    Some(EntryTarget {
        folder,
        file: Some(file),
    })
}

/// Whether the effective user may write to `path`.
///
/// A path with every write bit cleared counts as read-only even for root,
/// so a dry run as root predicts the same skips as an unprivileged one.
/// Missing paths are not writable.
pub fn is_writable(path: &Path) -> bool {
    let has_write_bit = fs::metadata(path)
        .map(|meta| !meta.permissions().readonly())
        .unwrap_or(false);
    has_write_bit && effective_user_can_write(path)
}

#[cfg(unix)]
fn effective_user_can_write(path: &Path) -> bool {
    use nix::unistd::{access, AccessFlags};

    access(path, AccessFlags::W_OK).is_ok()
}

#[cfg(not(unix))]
fn effective_user_can_write(_path: &Path) -> bool {
    true
}

/// Closest ancestor of `path` that exists on disk
pub fn nearest_existing_ancestor(path: &Path) -> Option<&Path> {
    path.ancestors().skip(1).find(|p| p.exists())
}

/// Create `folder` and any missing parents with `mode` (Unix only)
pub fn create_folder(folder: &Path, mode: u32) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    builder.create(folder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_backslashes() {
        assert_eq!(normalize_entry_name(r"lib\core\a.txt"), "lib/core/a.txt");
        assert_eq!(normalize_entry_name("lib/a.txt"), "lib/a.txt");
    }

    #[test]
    fn test_resolve_file_entry() {
        let target = resolve_target(Path::new("/opt/app"), "lib/core/a.txt").unwrap();
        assert_eq!(target.folder, PathBuf::from("/opt/app/lib/core"));
        assert_eq!(target.file, Some(PathBuf::from("/opt/app/lib/core/a.txt")));
    }

    #[test]
    fn test_resolve_root_file() {
        let target = resolve_target(Path::new("/opt/app"), "upgrade.sh").unwrap();
        assert_eq!(target.folder, PathBuf::from("/opt/app"));
        assert_eq!(target.file, Some(PathBuf::from("/opt/app/upgrade.sh")));
    }

    #[test]
    fn test_resolve_directory_entry() {
        let target = resolve_target(Path::new("/opt/app"), "lib/core/").unwrap();
        assert_eq!(target.folder, PathBuf::from("/opt/app/lib/core"));
        assert_eq!(target.file, None);
    }

    #[test]
    fn test_resolve_rejects_escaping_names() {
        assert!(resolve_target(Path::new("/opt/app"), "../etc/passwd").is_none());
        assert!(resolve_target(Path::new("/opt/app"), "lib/../../x").is_none());
        assert!(resolve_target(Path::new("/opt/app"), "/etc/passwd").is_none());
        assert!(resolve_target(Path::new("/opt/app"), "").is_none());
    }

    #[test]
    fn test_nearest_existing_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("a/b/c");
        assert_eq!(nearest_existing_ancestor(&deep), Some(dir.path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_create_folder_applies_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("x/y");
        create_folder(&folder, 0o750).unwrap();

        let mode = fs::metadata(&folder).unwrap().permissions().mode() & 0o777;
        // umask may only remove bits
        assert_eq!(mode & !0o750, 0);
        assert!(folder.is_dir());
    }

    #[test]
    fn test_is_writable_respects_readonly_bit() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, "x").unwrap();
        assert!(is_writable(&file));

        let mut perms = fs::metadata(&file).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&file, perms).unwrap();
        assert!(!is_writable(&file));
        assert!(!is_writable(&dir.path().join("missing")));
    }

    #[cfg(unix)]
    #[test]
    fn test_folder_without_write_bits_is_not_writable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("locked");
        fs::create_dir(&folder).unwrap();
        assert!(is_writable(&folder));

        fs::set_permissions(&folder, fs::Permissions::from_mode(0o555)).unwrap();
        assert!(!is_writable(&folder));

        fs::set_permissions(&folder, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_root_owned_folder_is_not_writable_for_other_users() {
        use nix::unistd::Uid;
        use std::os::unix::fs::MetadataExt;

        if Uid::effective().is_root() {
            return;
        }
        // "/" keeps its owner write bit, so only the effective-user check can refuse it
        let meta = fs::metadata("/").unwrap();
        if meta.uid() != 0 || meta.permissions().readonly() {
            return;
        }
        assert!(!is_writable(Path::new("/")));
    }
}
