pub mod impute;
