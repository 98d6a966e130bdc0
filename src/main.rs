fn main() {
    dropimpact::load();
}
