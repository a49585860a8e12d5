pub mod stored_object;

pub use stored_object::{
    content_length, BoxedContent, FileAttributes, ObjectContent, StoredFile, StoredHtml,
    HTML_CONTENT_DISPOSITION, HTML_MIME_TYPE,
};
