pub mod lemmas;
pub mod normalization;
pub mod stopwords;
