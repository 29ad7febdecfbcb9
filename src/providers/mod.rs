pub mod circleci;
