//! Shared key generation for storage backends.

use uuid::Uuid;

fn clean_segment(segment: &str) -> &str {
    segment.trim_matches(['/', '\\'])
}

/// Storage key of a media library file.
///
/// Backslashes in the library folder or file path are normalized to `/`.
pub fn media_file_key(site_name: &str, library_folder: &str, file_path: &str) -> String {
    let folder = clean_segment(library_folder).replace('\\', "/");
    let path = clean_segment(file_path).replace('\\', "/");
    if folder.is_empty() {
        format!("sites/{}/media/{}", site_name, path)
    } else {
        format!("sites/{}/media/{}/{}", site_name, folder, path)
    }
}

/// Storage key of a meta file. `extension` may be given with or without the dot.
pub fn meta_file_key(site_name: &str, guid: Uuid, extension: &str) -> String {
    let extension = extension.trim().trim_start_matches('.');
    if extension.is_empty() {
        format!("sites/{}/metafiles/{}", site_name, guid)
    } else {
        format!("sites/{}/metafiles/{}.{}", site_name, guid, extension)
    }
}
