pub mod corpus;
pub mod npy;
