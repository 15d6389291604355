//! API module - Request dispatch and endpoint argument types

mod dispatcher;
mod files;
mod request;

pub use dispatcher::{RequestDispatcher, API_ARG_HEADER, API_RESULT_HEADER};
pub use files::{
    DownloadArg, UploadArg, WriteMode, FILES_DOWNLOAD_PATH, FILES_UPLOAD_PATH, TIMESTAMP_FORMAT,
    TOKEN_REVOKE_PATH,
};
pub use request::{
    Blob, DecodedBody, HeaderDirectives, Method, RequestBody, RequestSpec, ResponseType,
};
