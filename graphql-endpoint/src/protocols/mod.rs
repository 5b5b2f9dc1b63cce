pub(crate) mod multipart;
