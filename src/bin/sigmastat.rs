fn main() {
    sigmastat::cli::run();
}
