pub mod config;
pub mod resolver;
pub mod resolvers;
