const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Strip characters that are not allowed in file names on common platforms
pub fn sanitize_filename(name: &str) -> String {
    name.chars().filter(|c| !INVALID_FILENAME_CHARS.contains(c)).collect()
}

/// The name the site gives an audio download: `"{title} - {identifier}.mp3"`
pub fn expected_filename(title: &str, identifier: &str) -> String {
    sanitize_filename(&format!("{} - {}.mp3", title.trim(), identifier.trim()))
}
