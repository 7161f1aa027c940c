//! Recovering archive paths from the `root` of a JBoss resource loader.
//!
//! Two generations of JBoss VFS are handled. Older ones expose the physical
//! file behind a `VirtualFile` directly; newer ones (WFLY-18544) mount
//! archives virtually, and the real archive is only reachable through the
//! mount's file system.

use loaderscope_api::{ObjRef, TypeRef, Value};
use loaderscope_plugin::ReflectionUtils;
use std::fs;
use std::path::Path;
use tracing::trace;

const VFS_TYPE: &str = "org.jboss.vfs.VFS";
const VFS_PACKAGE: &str = "org.jboss.vfs";

/// Archive path through `VFS.getMount(root).getFileSystem().getMountSource()`.
pub fn jar_path_from_mount(root: &Value, reflection: &ReflectionUtils) -> Option<Value> {
    let root_obj = root.as_object()?;
    let vfs = vfs_type(root_obj, reflection)?;

    // VFS.Mount
    let mount = reflection
        .invoke_static_method(&vfs, "getMount", std::slice::from_ref(root))?
        .into_object()?;
    // org.jboss.vfs.spi.FileSystem
    let file_system = reflection.invoke_object(&mount, "getFileSystem")?;
    // The file the mount was created from is the physical archive.
    let mount_source = reflection.invoke_method(&file_system, "getMountSource", &[])?;
    mount_source.as_file().is_some().then_some(mount_source)
}

/// Archive path through the root's physical file.
///
/// For an archive, the physical file is its `contents` directory, so the
/// archive itself is `<parent of physical>/<name>`; when that is not readable
/// the root is an exploded archive or plain directory and the physical file
/// is the answer. Roots without a physical file fall back to their path name,
/// and roots that are not VFS objects at all (a `Path` for directory
/// resources) are returned as they are.
pub fn jar_path_from_physical_file(root: &Value, reflection: &ReflectionUtils) -> Option<Value> {
    let root_obj = match root {
        Value::Null => return None,
        Value::Object(obj) => obj,
        other => return Some(other.clone()),
    };

    let physical = reflection
        .invoke_method(root_obj, "getPhysicalFile", &[])
        .and_then(|v| v.as_file().map(Path::to_path_buf));
    let Some(physical) = physical else {
        return match reflection.invoke_method(root_obj, "getPathName", &[]) {
            Some(path_name @ Value::Str(_)) => Some(path_name),
            _ => Some(root.clone()),
        };
    };

    let name = reflection
        .invoke_method(root_obj, "getName", &[])
        .and_then(|v| v.as_str().map(str::to_string));
    match (name, physical.parent()) {
        (Some(name), Some(parent)) => {
            let archive = parent.join(name);
            if can_read(&archive) {
                Some(Value::File(archive))
            } else {
                Some(Value::File(physical))
            }
        }
        _ => Some(Value::File(physical)),
    }
}

/// Resolve `org.jboss.vfs.VFS`: through the root's own defining loader when
/// the root is a VFS object, otherwise through the context loader, retrying
/// the context loader once if the first attempt fails.
fn vfs_type(root: &ObjRef, reflection: &ReflectionUtils) -> Option<TypeRef> {
    let root_type = root.runtime_type();
    let first = if root_type.name().contains(VFS_PACKAGE) {
        reflection.load_type(VFS_TYPE, root_type.defining_loader().as_ref())
    } else {
        reflection.load_type(VFS_TYPE, reflection.context_loader().as_ref())
    };

    match first {
        Ok(vfs) => Some(vfs),
        Err(e) => {
            trace!("{}, retrying with the context loader", e);
            match reflection.load_type(VFS_TYPE, reflection.context_loader().as_ref()) {
                Ok(vfs) => Some(vfs),
                Err(e) => {
                    trace!("JBoss VFS unavailable: {}", e);
                    None
                }
            }
        }
    }
}

fn can_read(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => fs::read_dir(path).is_ok(),
        Ok(_) => fs::File::open(path).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loaderscope_api::{DescribedObject, DescribedRuntime, DescribedType};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn virtual_file(physical: Option<PathBuf>, name: Option<&str>) -> Value {
        let ty: TypeRef = DescribedType::new("org.jboss.vfs.VirtualFile").build();
        let mut file = DescribedObject::new(ty);
        if let Some(physical) = physical {
            file = file.with_method("getPhysicalFile", physical);
        }
        if let Some(name) = name {
            file = file.with_method("getName", name);
        }
        let obj: ObjRef = file.build();
        Value::Object(obj)
    }

    fn reflection() -> ReflectionUtils {
        ReflectionUtils::new(Arc::new(DescribedRuntime::new()))
    }

    #[test]
    fn test_physical_file_of_packed_archive() {
        let dir = tempfile::tempdir().unwrap();
        let contents = dir.path().join("contents");
        fs::create_dir(&contents).unwrap();
        let jar = dir.path().join("lib.jar");
        fs::write(&jar, b"PK").unwrap();

        let root = virtual_file(Some(contents), Some("lib.jar"));
        let found = jar_path_from_physical_file(&root, &reflection()).unwrap();
        assert_eq!(found.as_file(), Some(jar.as_path()));
    }

    #[test]
    fn test_physical_file_of_exploded_archive() {
        let dir = tempfile::tempdir().unwrap();
        let exploded = dir.path().join("contents");
        fs::create_dir(&exploded).unwrap();

        let root = virtual_file(Some(exploded.clone()), Some("app.war"));
        let found = jar_path_from_physical_file(&root, &reflection()).unwrap();
        assert_eq!(found.as_file(), Some(exploded.as_path()));

        let unnamed = virtual_file(Some(exploded.clone()), None);
        let found = jar_path_from_physical_file(&unnamed, &reflection()).unwrap();
        assert_eq!(found.as_file(), Some(exploded.as_path()));
    }

    #[test]
    fn test_roots_without_physical_file() {
        let ty: TypeRef = DescribedType::new("org.jboss.vfs.VirtualFile").build();
        let named: ObjRef = DescribedObject::new(ty.clone())
            .with_method("getPathName", "/srv/app/lib/x.jar")
            .build();
        let found = jar_path_from_physical_file(&Value::Object(named), &reflection()).unwrap();
        assert_eq!(found.as_str(), Some("/srv/app/lib/x.jar"));

        // Nothing to go on: the root itself is handed over.
        let bare: ObjRef = DescribedObject::new(ty).build();
        let found = jar_path_from_physical_file(&Value::Object(bare.clone()), &reflection()).unwrap();
        assert!(Arc::ptr_eq(found.as_object().unwrap(), &bare));

        // A plain path root is its own answer.
        let path = Value::File(PathBuf::from("/srv/resources"));
        let found = jar_path_from_physical_file(&path, &reflection()).unwrap();
        assert_eq!(found.as_file(), Some(Path::new("/srv/resources")));

        assert!(jar_path_from_physical_file(&Value::Null, &reflection()).is_none());
    }

    #[test]
    fn test_mount_requires_vfs_and_object_root() {
        let root = virtual_file(None, None);
        assert!(jar_path_from_mount(&root, &reflection()).is_none());
        assert!(jar_path_from_mount(&Value::File("/x".into()), &reflection()).is_none());
    }
}
