pub mod mastery;
